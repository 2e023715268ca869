/// Wire opcode table (spec §6). Each variant's discriminant is the 4-byte
/// big-endian integer written/read on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Opcode {
    Acknowledgement = 0,
    Login = 1,
    UserAuthenticationFailed = 2,
    UserAuthenticationPassed = 3,
    Query = 4,
    ResultSection = 5,
    PushStreamableObjectPart = 6,
    StreamableObjectSection = 7,
    DisposeResult = 8,
    DisposeStreamableObject = 9,
    Close = 10,
    Ping = 11,
    DatabaseEvent = 12,
    Success = 13,
    Exception = 14,
}

impl Opcode {
    pub fn from_i32(v: i32) -> Option<Opcode> {
        Some(match v {
            0 => Opcode::Acknowledgement,
            1 => Opcode::Login,
            2 => Opcode::UserAuthenticationFailed,
            3 => Opcode::UserAuthenticationPassed,
            4 => Opcode::Query,
            5 => Opcode::ResultSection,
            6 => Opcode::PushStreamableObjectPart,
            7 => Opcode::StreamableObjectSection,
            8 => Opcode::DisposeResult,
            9 => Opcode::DisposeStreamableObject,
            10 => Opcode::Close,
            11 => Opcode::Ping,
            12 => Opcode::DatabaseEvent,
            13 => Opcode::Success,
            14 => Opcode::Exception,
            _ => return None,
        })
    }
}

/// `dispatch_id` carried by out-of-band server pushes (spec §4.G: "Callbacks
/// from the database... are pushed to the client with dispatch_id = -1").
pub const UNSOLICITED_DISPATCH_ID: i32 = -1;

/// The magic value a client's HANDSHAKE frame must carry.
pub const HANDSHAKE_MAGIC: u32 = 0x5243_4953; // "RCIS"

/// The server's protocol version, echoed in ACKNOWLEDGEMENT.
pub const SERVER_VERSION: u32 = 1;
