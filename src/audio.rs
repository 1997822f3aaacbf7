use hound::{WavReader, WavSpec, WavWriter};
use std::error::Error as StdError;
use std::fmt;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

#[derive(Debug)]
pub enum AudioError {
    /// Upload had no bytes or decoded to no samples
    Empty,
    /// Container has no decodable audio track
    NoTrack,
    UnknownSampleRate,
    Decode(SymphoniaError),
    Wav(hound::Error),
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioError::Empty => write!(f, "Recording is empty"),
            AudioError::NoTrack => write!(f, "No audio track found"),
            AudioError::UnknownSampleRate => write!(f, "Unknown sample rate"),
            AudioError::Decode(err) => write!(f, "Failed to decode audio: {}", err),
            AudioError::Wav(err) => write!(f, "Failed to write WAV: {}", err),
        }
    }
}

impl StdError for AudioError {}

impl From<SymphoniaError> for AudioError {
    fn from(err: SymphoniaError) -> Self {
        AudioError::Decode(err)
    }
}

impl From<hound::Error> for AudioError {
    fn from(err: hound::Error) -> Self {
        AudioError::Wav(err)
    }
}

/// A recording re-encoded as mono 16-bit PCM WAV
#[derive(Debug, Clone)]
pub struct EncodedAudio {
    pub wav: Vec<u8>,
    pub sample_rate: u32,
    pcm: Vec<i16>,
}

impl EncodedAudio {
    /// Mono samples at `sample_rate`
    pub fn pcm(&self) -> &[i16] {
        &self.pcm
    }

    pub fn sample_count(&self) -> u64 {
        self.pcm.len() as u64
    }

    pub fn duration_secs(&self) -> f64 {
        self.pcm.len() as f64 / self.sample_rate as f64
    }

    /// Duration as shown next to the player, e.g. "~2.5 sec"
    pub fn duration_display(&self) -> String {
        format!("~{:.1} sec", self.duration_secs())
    }
}

/// Decode whatever the browser uploaded and re-encode it as mono WAV at the
/// source sample rate
pub fn encode_wav(input: &[u8]) -> Result<EncodedAudio, AudioError> {
    if input.is_empty() {
        return Err(AudioError::Empty);
    }

    let (pcm, sample_rate) = decode_to_mono(input)?;
    if pcm.is_empty() {
        return Err(AudioError::Empty);
    }

    Ok(EncodedAudio {
        wav: write_wav(&pcm, sample_rate)?,
        sample_rate,
        pcm,
    })
}

fn decode_to_mono(input: &[u8]) -> Result<(Vec<i16>, u32), AudioError> {
    let cursor = Cursor::new(input.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let probed = symphonia::default::get_probe().format(
        &Hint::new(),
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(AudioError::NoTrack)?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;
    let mut sample_rate = codec_params.sample_rate;
    let mut mono: Vec<i16> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Skip a corrupt packet, keep the rest of the clip
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        let channels = spec.channels.count().max(1);

        let mut sample_buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        let samples = sample_buf.samples();

        if channels == 1 {
            mono.extend_from_slice(samples);
        } else {
            mono.extend(samples.chunks(channels).map(|chunk| {
                let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
                (sum / chunk.len() as i32) as i16
            }));
        }
    }

    let sample_rate = sample_rate.ok_or(AudioError::UnknownSampleRate)?;
    Ok((mono, sample_rate))
}

/// Write mono 16-bit samples as an in-memory WAV file
pub fn write_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>, AudioError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Duration implied by a WAV file's header and data length
pub fn wav_duration_secs(wav: &[u8]) -> Result<f64, AudioError> {
    let reader = WavReader::new(Cursor::new(wav))?;
    let spec = reader.spec();
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}

/// Mono PCM at `target_rate`, for recognizers that take raw L16
pub fn pcm_for_recognition(audio: &EncodedAudio, target_rate: u32) -> Vec<i16> {
    resample(audio.pcm(), audio.sample_rate, target_rate)
}

/// Resample audio from source sample rate to target rate
pub fn resample(samples: &[i16], src_rate: u32, target_rate: u32) -> Vec<i16> {
    if src_rate == target_rate {
        return samples.to_vec();
    }

    let ratio = target_rate as f64 / src_rate as f64;
    let new_len = (samples.len() as f64 * ratio) as usize;
    let mut resampled = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_pos = i as f64 / ratio;
        let src_idx = src_pos as usize;
        let frac = src_pos - src_idx as f64;

        let sample = if src_idx + 1 < samples.len() {
            let s1 = samples[src_idx] as f64;
            let s2 = samples[src_idx + 1] as f64;
            (s1 + frac * (s2 - s1)) as i16
        } else if src_idx < samples.len() {
            samples[src_idx]
        } else {
            0
        };

        resampled.push(sample);
    }

    resampled
}
