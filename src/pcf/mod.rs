//! Programmable Command Format (PCF) structures.
//!
//! A PCF message is a fixed 36-byte header followed by `parameter_count`
//! self-describing parameter structures. Every parameter starts with its type
//! and its total structure length, so a reader can step over types it does
//! not understand. Integers are encoded little-endian.

pub mod parse;

use std::fmt;

pub use self::parse::{decode_parameters, read_message, read_parameter, ParseError};

/// Size of the command/response header (`MQCFH`).
pub const HEADER_SIZE: usize = 36;

// Structure types.
pub const MQCFT_COMMAND: i32 = 1;
pub const MQCFT_RESPONSE: i32 = 2;
pub const MQCFT_INTEGER: i32 = 3;
pub const MQCFT_STRING: i32 = 4;
pub const MQCFT_INTEGER_LIST: i32 = 5;
pub const MQCFT_STRING_LIST: i32 = 6;
pub const MQCFT_INTEGER64: i32 = 23;
pub const MQCFT_INTEGER64_LIST: i32 = 25;

pub const MQCFH_VERSION_1: i32 = 1;

// Control and completion codes.
pub const MQCFC_NOT_LAST: i32 = 0;
pub const MQCFC_LAST: i32 = 1;
pub const MQCC_OK: i32 = 0;
pub const MQCC_WARNING: i32 = 1;
pub const MQCC_FAILED: i32 = 2;

/// Coded character set used for strings written by this crate (UTF-8).
pub const CCSID_UTF8: i32 = 1208;

// Parameter codes.
pub const MQIA_CURRENT_Q_DEPTH: i32 = 3;
pub const MQIA_USAGE: i32 = 12;
pub const MQIA_MAX_Q_DEPTH: i32 = 15;
pub const MQIA_OPEN_INPUT_COUNT: i32 = 17;
pub const MQIA_OPEN_OUTPUT_COUNT: i32 = 18;
pub const MQIA_Q_TYPE: i32 = 20;
pub const MQIA_HIGH_Q_DEPTH: i32 = 36;
pub const MQIA_MSG_ENQ_COUNT: i32 = 37;
pub const MQIA_MSG_DEQ_COUNT: i32 = 38;
pub const MQIACF_Q_ATTRS: i32 = 1002;
pub const MQIACF_Q_STATUS_TYPE: i32 = 1103;
pub const MQIACF_Q_STATUS: i32 = 1105;
pub const MQIACF_Q_TIME_INDICATOR: i32 = 1226;
pub const MQIACF_OLDEST_MSG_AGE: i32 = 1227;
pub const MQIACF_CUR_Q_FILE_SIZE: i32 = 1437;
pub const MQIACF_CUR_MAX_FILE_SIZE: i32 = 1438;
pub const MQCA_Q_DESC: i32 = 2013;
pub const MQCA_Q_NAME: i32 = 2016;
pub const MQCACF_Q_NAMES: i32 = 3011;
pub const MQCACF_LAST_PUT_DATE: i32 = 3128;
pub const MQCACF_LAST_PUT_TIME: i32 = 3129;
pub const MQCACF_LAST_GET_DATE: i32 = 3130;
pub const MQCACF_LAST_GET_TIME: i32 = 3131;

/// Queue type selector matching every queue type.
pub const MQQT_ALL: i32 = 1001;

/// Administrative command carried in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Command {
    InquireQueue = 13,
    ResetQueueStats = 17,
    InquireQueueNames = 18,
    InquireQueueStatus = 41,
}

impl Command {
    /// Returns the canonical metric/log label name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InquireQueue => "inquire_q",
            Self::ResetQueueStats => "reset_q_stats",
            Self::InquireQueueNames => "inquire_q_names",
            Self::InquireQueueStatus => "inquire_q_status",
        }
    }

    /// Convert from the raw header value.
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            13 => Some(Self::InquireQueue),
            17 => Some(Self::ResetQueueStats),
            18 => Some(Self::InquireQueueNames),
            41 => Some(Self::InquireQueueStatus),
            _ => None,
        }
    }

    /// Return all commands in numeric order.
    pub fn all() -> &'static [Self] {
        &[
            Self::InquireQueue,
            Self::ResetQueueStats,
            Self::InquireQueueNames,
            Self::InquireQueueStatus,
        ]
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded `MQCFH` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Structure type (`MQCFT_COMMAND` or `MQCFT_RESPONSE`).
    pub kind: i32,
    pub version: i32,
    /// Raw command identifier.
    pub command: i32,
    pub msg_seq_number: i32,
    /// `MQCFC_LAST` on the final message of a response set.
    pub control: i32,
    pub comp_code: i32,
    pub reason: i32,
    pub parameter_count: i32,
}

impl Header {
    /// The command this header belongs to, if it is one this crate issues.
    pub fn command(&self) -> Option<Command> {
        Command::from_i32(self.command)
    }

    pub fn is_last(&self) -> bool {
        self.control == MQCFC_LAST
    }

    pub fn is_failed(&self) -> bool {
        self.comp_code == MQCC_FAILED
    }

    /// Encode the header into its 36-byte wire form.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let fields = [
            self.kind,
            HEADER_SIZE as i32,
            self.version,
            self.command,
            self.msg_seq_number,
            self.control,
            self.comp_code,
            self.reason,
            self.parameter_count,
        ];
        let mut out = [0u8; HEADER_SIZE];
        for (chunk, v) in out.chunks_exact_mut(4).zip(fields) {
            chunk.copy_from_slice(&v.to_le_bytes());
        }
        out
    }
}

/// A complete PCF message: header plus the raw parameter bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub body: Vec<u8>,
}

/// Payload of a single decoded parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterValue {
    Integer(i64),
    IntegerList(Vec<i64>),
    String(String),
    StringList(Vec<String>),
    /// A structure type this crate does not decode. Stepped over by length.
    Unsupported { type_tag: i32 },
}

/// One self-describing field of a PCF message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub code: i32,
    pub value: ParameterValue,
}

impl Parameter {
    /// The integer at `index` for integer and integer-list parameters.
    ///
    /// A scalar integer only answers index 0.
    pub fn int_at(&self, index: usize) -> Option<i64> {
        match &self.value {
            ParameterValue::Integer(v) if index == 0 => Some(*v),
            ParameterValue::IntegerList(list) => list.get(index).copied(),
            _ => None,
        }
    }

    /// The string at `index` for string and string-list parameters.
    pub fn str_at(&self, index: usize) -> Option<&str> {
        match &self.value {
            ParameterValue::String(s) if index == 0 => Some(s.as_str()),
            ParameterValue::StringList(list) => list.get(index).map(String::as_str),
            _ => None,
        }
    }
}

/// Builds PCF messages one parameter at a time, counting parameters as it
/// goes so the header can be written once the body is complete.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    header: Header,
    body: Vec<u8>,
}

impl MessageBuilder {
    /// Start a command message (`MQCFT_COMMAND`).
    pub fn command(command: Command) -> Self {
        Self::with_kind(MQCFT_COMMAND, command as i32)
    }

    /// Start a response message (`MQCFT_RESPONSE`), marked as the last of
    /// its set unless [`MessageBuilder::not_last`] is called.
    pub fn response(command: Command) -> Self {
        Self::with_kind(MQCFT_RESPONSE, command as i32)
    }

    fn with_kind(kind: i32, command: i32) -> Self {
        Self {
            header: Header {
                kind,
                version: MQCFH_VERSION_1,
                command,
                msg_seq_number: 1,
                control: MQCFC_LAST,
                comp_code: MQCC_OK,
                reason: 0,
                parameter_count: 0,
            },
            body: Vec::with_capacity(128),
        }
    }

    pub fn not_last(mut self) -> Self {
        self.header.control = MQCFC_NOT_LAST;
        self
    }

    pub fn sequence(mut self, msg_seq_number: i32) -> Self {
        self.header.msg_seq_number = msg_seq_number;
        self
    }

    pub fn completion(mut self, comp_code: i32, reason: i32) -> Self {
        self.header.comp_code = comp_code;
        self.header.reason = reason;
        self
    }

    /// Append an `MQCFIN` parameter.
    pub fn integer(mut self, code: i32, value: i32) -> Self {
        self.push_i32s(&[MQCFT_INTEGER, 16, code, value]);
        self.header.parameter_count += 1;
        self
    }

    /// Append an `MQCFIN64` parameter.
    pub fn integer64(mut self, code: i32, value: i64) -> Self {
        self.push_i32s(&[MQCFT_INTEGER64, 24, code, 0]);
        self.body.extend_from_slice(&value.to_le_bytes());
        self.header.parameter_count += 1;
        self
    }

    /// Append an `MQCFIL` parameter.
    pub fn integer_list(mut self, code: i32, values: &[i32]) -> Self {
        let len = 16 + 4 * values.len() as i32;
        self.push_i32s(&[MQCFT_INTEGER_LIST, len, code, values.len() as i32]);
        self.push_i32s(values);
        self.header.parameter_count += 1;
        self
    }

    /// Append an `MQCFST` parameter, padded to a 4-byte boundary.
    pub fn string(mut self, code: i32, value: &str) -> Self {
        let raw = value.as_bytes();
        let padded = pad4(raw.len());
        let len = 20 + padded as i32;
        self.push_i32s(&[MQCFT_STRING, len, code, CCSID_UTF8, raw.len() as i32]);
        self.body.extend_from_slice(raw);
        self.body.resize(self.body.len() + (padded - raw.len()), b' ');
        self.header.parameter_count += 1;
        self
    }

    /// Append an `MQCFSL` parameter. Every element is blank-padded to the
    /// length of the longest one.
    pub fn string_list(mut self, code: i32, values: &[&str]) -> Self {
        let width = values.iter().map(|v| v.len()).max().unwrap_or(0);
        let total = width * values.len();
        let padded = pad4(total);
        let len = 24 + padded as i32;
        self.push_i32s(&[
            MQCFT_STRING_LIST,
            len,
            code,
            CCSID_UTF8,
            values.len() as i32,
            width as i32,
        ]);
        for v in values {
            self.body.extend_from_slice(v.as_bytes());
            self.body.resize(self.body.len() + (width - v.len()), b' ');
        }
        self.body.resize(self.body.len() + (padded - total), b' ');
        self.header.parameter_count += 1;
        self
    }

    fn push_i32s(&mut self, values: &[i32]) {
        for v in values {
            self.body.extend_from_slice(&v.to_le_bytes());
        }
    }

    /// The header as it will be written.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Finish the message and return its wire bytes.
    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + self.body.len());
        out.extend_from_slice(&self.header.to_bytes());
        out.extend_from_slice(&self.body);
        out
    }
}

fn pad4(len: usize) -> usize {
    (len + 3) & !3
}
