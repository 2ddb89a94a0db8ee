pub const MAX_NAME_LEN: usize = 256;
pub const MAX_EMAIL_LEN: usize = 320;
pub const MAX_TOKEN_LEN: usize = 512;
/// Highest hourly rate a tutor may register with, in whole currency units.
pub const MAX_HOURLY_RATE: i64 = 100_000;
pub const MAX_WINDOWS_PER_TUTOR_DAY: usize = 96;
pub const MAX_SESSIONS_PER_TUTOR_DAY: usize = 96;
/// Longest request line accepted by the wire protocol.
pub const MAX_LINE_LEN: usize = 64 * 1024;
