// factloop - iterative fact extraction with model-proposed JSON patches
// Library exports

pub mod cli;
pub mod collaborators;
pub mod config;
pub mod corpus;
pub mod errors;
pub mod facts;
pub mod patch;
pub mod providers;
pub mod refine;
pub mod store;
