pub mod band_split;
pub mod filter;
pub mod fir;
pub mod noise;
pub mod reconstruct;
pub mod sample;
pub mod stream;

pub use band_split::BandSplitter;
pub use filter::MultirateFilter;
pub use fir::FirKernel;
pub use noise::NoiseTable;
pub use reconstruct::{LowpassHistory, Reconstructor};
pub use sample::Int24;
pub use stream::BlockStream;
