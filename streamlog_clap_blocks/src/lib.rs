//! Building blocks for [`clap`]-driven configuration of stream publishers.

pub mod publisher;
