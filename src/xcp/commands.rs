//----------------------------------------------------------------------------------------------
// Module xcp::commands
//
// Wire-level command codes and packet encoders for the XCP v1.0 subset this master
// needs. Byte layouts follow the ASAM XCP command reference; the subset and their
// semantics for a firmware update are described in xcploader.c of the original loader.

use super::byteorder::{get_u16, put_u32};

pub const CC_CONNECT: u8 = 0xFF;
pub const CC_GET_STATUS: u8 = 0xFD;
pub const CC_PROGRAM_START: u8 = 0xD2;
pub const CC_SET_MTA: u8 = 0xF6;
pub const CC_PROGRAM_CLEAR: u8 = 0xD1;
pub const CC_PROGRAM: u8 = 0xD0;
pub const CC_PROGRAM_MAX: u8 = 0xC9;
pub const CC_UPLOAD: u8 = 0xF5;
pub const CC_PROGRAM_RESET: u8 = 0xCF;

/// Positive response packet identifier, shared by every command in this subset.
pub const PID_RESPONSE_OK: u8 = 0xFF;

/// Bit 0 of the CONNECT response's comm mode byte: 0 selects little-endian.
pub const COMM_MODE_BYTE_ORDER_MASK: u8 = 0x01;

/// Resource protection bit for the PGM (programming) resource, as reported by
/// GET_STATUS / CONNECT resource flags.
pub const RESOURCE_PGM: u8 = 0x10;

pub fn connect_request(mode: u8) -> Vec<u8> {
    vec![CC_CONNECT, mode]
}

/// Parsed CONNECT response: resource flags, negotiated byte order, max_cto, max_dto.
pub struct ConnectResponse {
    pub resource: u8,
    pub little_endian: bool,
    pub max_cto: u8,
    pub max_dto: u16,
}

pub fn parse_connect_response(resp: &[u8]) -> Option<ConnectResponse> {
    // [PID, resource, commMode, maxCto, maxDto_lo, maxDto_hi, pVer, tVer]
    if resp.len() != 8 || resp[0] != PID_RESPONSE_OK {
        return None;
    }
    let little_endian = resp[2] & COMM_MODE_BYTE_ORDER_MASK == 0;
    Some(ConnectResponse {
        resource: resp[1],
        little_endian,
        max_cto: resp[3],
        max_dto: get_u16(&resp[4..6], little_endian),
    })
}

pub fn get_status_request() -> Vec<u8> {
    vec![CC_GET_STATUS]
}

pub struct StatusResponse {
    pub session_status: u8,
    pub protected_resources: u8,
}

pub fn parse_get_status_response(resp: &[u8]) -> Option<StatusResponse> {
    // [PID, sessionStatus, protectedResources, reserved, sessionCfgId_lo, sessionCfgId_hi]
    if resp.len() != 6 || resp[0] != PID_RESPONSE_OK {
        return None;
    }
    Some(StatusResponse {
        session_status: resp[1],
        protected_resources: resp[2],
    })
}

pub fn program_start_request() -> Vec<u8> {
    vec![CC_PROGRAM_START]
}

pub fn parse_program_start_response(resp: &[u8]) -> Option<u8> {
    // [PID, reserved, commModePgm, maxCtoPgm, maxBsPgm, stMin, reserved2]
    if resp.len() != 7 || resp[0] != PID_RESPONSE_OK {
        return None;
    }
    Some(resp[3])
}

pub fn set_mta_request(address: u32, little_endian: bool) -> Vec<u8> {
    let mut req = vec![CC_SET_MTA, 0, 0, 0 /* address extension */, 0, 0, 0, 0];
    put_u32(&mut req[4..8], address, little_endian);
    req
}

pub fn program_clear_request(length: u32, little_endian: bool) -> Vec<u8> {
    let mut req = vec![CC_PROGRAM_CLEAR, 0 /* mode: absolute */, 0, 0, 0, 0, 0, 0];
    put_u32(&mut req[4..8], length, little_endian);
    req
}

pub fn program_request(data: &[u8]) -> Vec<u8> {
    let mut req = Vec::with_capacity(2 + data.len());
    req.push(CC_PROGRAM);
    req.push(data.len() as u8);
    req.extend_from_slice(data);
    req
}

pub fn program_max_request(data: &[u8]) -> Vec<u8> {
    let mut req = Vec::with_capacity(1 + data.len());
    req.push(CC_PROGRAM_MAX);
    req.extend_from_slice(data);
    req
}

pub fn upload_request(count: u8) -> Vec<u8> {
    vec![CC_UPLOAD, count]
}

pub fn program_reset_request() -> Vec<u8> {
    vec![CC_PROGRAM_RESET]
}

pub fn is_positive(resp: &[u8]) -> bool {
    !resp.is_empty() && resp[0] == PID_RESPONSE_OK
}

pub(super) fn resource_locked(resource: u8) -> bool {
    resource & RESOURCE_PGM != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_response_round_trips_little_endian() {
        let resp = vec![PID_RESPONSE_OK, RESOURCE_PGM, 0x00, 8, 0x40, 0x00, 0x01, 0x00];
        let parsed = parse_connect_response(&resp).unwrap();
        assert!(parsed.little_endian);
        assert_eq!(parsed.max_cto, 8);
        assert_eq!(parsed.max_dto, 0x0040);
        assert!(resource_locked(parsed.resource));
    }

    #[test]
    fn connect_response_honors_big_endian_comm_mode_bit() {
        let resp = vec![PID_RESPONSE_OK, 0x00, COMM_MODE_BYTE_ORDER_MASK, 8, 0x00, 0x40, 0x01, 0x00];
        let parsed = parse_connect_response(&resp).unwrap();
        assert!(!parsed.little_endian);
        assert_eq!(parsed.max_dto, 0x0040);
    }

    #[test]
    fn connect_response_rejects_wrong_length() {
        assert!(parse_connect_response(&[PID_RESPONSE_OK, 0x00]).is_none());
    }

    #[test]
    fn is_positive_checks_pid_byte() {
        assert!(is_positive(&[PID_RESPONSE_OK, 0x01]));
        assert!(!is_positive(&[0xFE, 0x20]));
        assert!(!is_positive(&[]));
    }

    #[test]
    fn program_request_encodes_length_prefix() {
        let req = program_request(&[1, 2, 3]);
        assert_eq!(req, vec![CC_PROGRAM, 3, 1, 2, 3]);
    }
}
