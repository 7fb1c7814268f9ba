pub mod engine;
pub mod extract;
pub mod setup;

pub use engine::{TesseractRecognizer, TextRecognizer};
pub use extract::parse_ores;
pub use setup::ensure_tessdata;
