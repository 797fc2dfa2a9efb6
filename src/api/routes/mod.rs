pub mod alerts;
pub mod health;
pub mod refresh;
pub mod stats;
pub mod topology;
