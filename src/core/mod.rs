pub mod batch;
pub mod bill;
pub mod legislator;
pub mod noise;
pub mod pipeline;
pub mod region;
