//! Response-variable preprocessing

mod encoder;

pub use encoder::LabelEncoder;
