mod conv2d;
mod dense;
mod flatten;
mod l2_normalize;
mod layer;
mod max_pool2d;

pub use conv2d::Conv2d;
pub use dense::Dense;
pub use flatten::Flatten;
pub use l2_normalize::L2Normalize;
pub use layer::Layer;
pub use max_pool2d::MaxPool2d;
