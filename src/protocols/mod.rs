pub mod header;
pub mod packet;

pub use header::{read_proceed, read_request, write_response, Request, RequestHeader};
pub use packet::{OutputWriter, Packet, PacketSender};
