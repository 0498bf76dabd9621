mod decode;
mod round_trip;
