pub mod cluster;

pub mod coin_load;

pub mod logging;

pub mod network;
