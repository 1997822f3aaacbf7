use sea_query::Iden;

/// Feedback table - one row per saved voice recording.
/// The table name is configurable, so queries take it as an alias
/// and only the columns come from here.
#[derive(Iden, Clone, Copy)]
pub enum Feedback {
    Id,
    Timestamp,
    FeedbackType,
    FeedbackText,
    Room,
    UserId,
    AudioPath,
    AudioMime,
    Source,
}

pub const ALL_COLUMNS: [Feedback; 9] = [
    Feedback::Id,
    Feedback::Timestamp,
    Feedback::FeedbackType,
    Feedback::FeedbackText,
    Feedback::Room,
    Feedback::UserId,
    Feedback::AudioPath,
    Feedback::AudioMime,
    Feedback::Source,
];
