pub mod crowd;
pub mod delay;
pub mod fetch;
pub mod output;
pub mod proxy;
pub mod tables;
