pub mod capture;
pub mod filter;
pub mod wav;
