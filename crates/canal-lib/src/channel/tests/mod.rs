mod codec;
mod exchange;
mod utils;
