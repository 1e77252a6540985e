//! Protocol module containing the frame codec and the command seams.

pub mod command;
pub mod frame;

pub use command::{
    BoxError, Command, CommandDecoder, CommandRegistry, DecodeError, DecodeFn, RawCommand,
    RawDecoder,
};
pub use frame::{
    can_extract, encode_command, encode_frame, encoded_len, extract, peek_header, FrameHeader,
    ProtocolError, RawFrame, FRAME_HEADER_SIZE,
};
