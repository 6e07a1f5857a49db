// InfoExtractor module - media metadata retrieval
//
// The metadata source is a black box behind the InfoExtractor trait.
// CliInfoExtractor drives the native `yt-dlp` binary.

mod cli;
mod traits;

pub use cli::CliInfoExtractor;
pub use traits::{ExtractorConfig, InfoExtractor};
