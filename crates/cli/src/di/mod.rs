mod backend;

pub use backend::build_backend;
