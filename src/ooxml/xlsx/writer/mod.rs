//! Serializers for the workbook parts longan rewrites, and the streaming
//! worksheet writer.

pub mod buffer;
pub mod sheet;
pub mod stream;
pub mod table;
pub mod workbook;

pub use stream::StreamWriter;
