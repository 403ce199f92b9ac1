pub mod images;
pub mod rates;
