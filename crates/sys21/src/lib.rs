pub mod bits;
pub mod fifo;
pub mod geometry;
pub mod machine;
pub mod scheduler;
