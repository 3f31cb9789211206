pub mod blobs;
pub mod orchestrations;
