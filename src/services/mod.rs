pub mod merge;
pub mod normalize;
pub mod pipeline;
pub mod publish;
pub mod storage;
