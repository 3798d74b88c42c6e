use std::time::Duration;

pub const UPVOTE_EMOJI: &str = "🔥";
pub const DOWNVOTE_EMOJI: &str = "🍅";

// Bounded waits for chain-walk and directory lookups; expiry degrades to a
// truncated chain / stringified id instead of hanging the handler.
pub const MESSAGE_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const MEMBER_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Predicted cost a prompt is authorized against before the real usage is
/// known.
pub const PROMPT_COST_ESTIMATE: f64 = 0.001;

/// Raw balance -> displayed dabloons.
pub const DABLOON_RATE: f64 = 250.0;
