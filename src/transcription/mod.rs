pub mod gemini;
pub mod worker;
