use std::fmt;
use std::str::FromStr;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::{char, digit1, space0, space1},
    combinator::{all_consuming, eof, map, map_res, opt, recognize},
    error::Error as NomError,
    multi::{many0, separated_list0},
    sequence::{pair, preceded, separated_pair, terminated, tuple},
    IResult,
};

use crate::errors::{Error, Result};

/// Protocol version written on every request and reply
pub const RTSP_VERSION: &str = "RTSP/1.0";

/// Transport description sent with SETUP
pub const TRANSPORT_PROFILE: &str = "RTP/UDP";

/// Control methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Setup,
    Play,
    Pause,
    Teardown,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Setup => "SETUP",
            Method::Play => "PLAY",
            Method::Pause => "PAUSE",
            Method::Teardown => "TEARDOWN",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SETUP" => Ok(Method::Setup),
            "PLAY" => Ok(Method::Play),
            "PAUSE" => Ok(Method::Pause),
            "TEARDOWN" => Ok(Method::Teardown),
            other => Err(Error::MalformedRequest(format!("Unknown method: {}", other))),
        }
    }
}

/// Reply status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(200);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);

    pub fn as_u16(&self) -> u16 {
        self.0
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.0)
    }

    /// Canonical reason phrase
    pub fn reason(&self) -> &'static str {
        match self.0 {
            200 => "OK",
            404 => "Not Found",
            500 => "Internal Server Error",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.reason())
    }
}

type ParseResult<'a, T> = IResult<&'a str, T>;

fn is_line_end(c: char) -> bool {
    c == '\r' || c == '\n'
}

/// CRLF or bare LF
fn line_end(input: &str) -> ParseResult<'_, &str> {
    alt((tag("\r\n"), tag("\n")))(input)
}

fn token(input: &str) -> ParseResult<'_, &str> {
    take_while1(|c: char| !c.is_whitespace())(input)
}

fn request_line(input: &str) -> ParseResult<'_, (Method, &str, &str)> {
    terminated(
        tuple((
            map_res(take_while1(|c: char| c.is_ascii_alphabetic()), Method::from_str),
            preceded(space1, token),
            preceded(space1, token),
        )),
        pair(space0, line_end),
    )(input)
}

fn status_line(input: &str) -> ParseResult<'_, (&str, u16, &str)> {
    terminated(
        tuple((
            recognize(pair(tag("RTSP/"), take_till(|c: char| c.is_whitespace()))),
            preceded(space1, decimal::<u16>),
            map(opt(preceded(space1, take_till(is_line_end))), |reason| reason.unwrap_or_default()),
        )),
        line_end,
    )(input)
}

/// `Name: value`, tolerating whitespace around both
fn header_line(input: &str) -> ParseResult<'_, (&str, &str)> {
    terminated(
        map(
            separated_pair(take_while1(|c: char| c != ':' && !is_line_end(c)), char(':'), take_till(is_line_end)),
            |(name, value): (&str, &str)| (name.trim(), value.trim()),
        ),
        alt((line_end, eof)),
    )(input)
}

/// Headers up to and including the blank line (or end of input)
fn header_block(input: &str) -> ParseResult<'_, Vec<(&str, &str)>> {
    terminated(many0(header_line), alt((line_end, eof)))(input)
}

fn message<'a, T>(
    start: impl FnMut(&'a str) -> ParseResult<'a, T>,
) -> impl FnMut(&'a str) -> ParseResult<'a, (T, Vec<(&'a str, &'a str)>)> {
    preceded(many0(line_end), pair(start, header_block))
}

fn decimal<T: FromStr>(input: &str) -> ParseResult<'_, T> {
    map_res(digit1, T::from_str)(input)
}

/// Whole-value decimal number
fn number<T: FromStr>(value: &str) -> Option<T> {
    all_consuming(decimal::<T>)(value).ok().map(|(_, n)| n)
}

/// Session id, optionally followed by parameters (`12345;timeout=60`)
fn session_id(input: &str) -> ParseResult<'_, u32> {
    terminated(decimal::<u32>, pair(space0, alt((eof, recognize(char(';'))))))(input)
}

fn describe(err: nom::Err<NomError<&str>>) -> String {
    match err {
        nom::Err::Incomplete(_) => "incomplete input".to_string(),
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let line = e.input.lines().next().unwrap_or_default();
            format!("{:?} at {:?}", e.code, line)
        }
    }
}

fn header<'a>(headers: &[(&'a str, &'a str)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| *v)
}

fn transport_param(input: &str) -> ParseResult<'_, (&str, Option<&str>)> {
    pair(
        map(take_while1(|c: char| c != ';' && c != '='), str::trim),
        opt(preceded(char('='), map(take_while(|c: char| c != ';'), str::trim))),
    )(input)
}

fn port_range(input: &str) -> ParseResult<'_, u16> {
    terminated(decimal::<u16>, opt(pair(char('-'), digit1)))(input)
}

/// Extract `client_port` from a `Transport` header value. A port range
/// (`25000-25001`) yields its first port.
pub fn parse_client_port(transport: &str) -> Option<u16> {
    let (_, params) = separated_list0(char(';'), transport_param)(transport).ok()?;
    params
        .into_iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("client_port"))
        .and_then(|(_, value)| all_consuming(port_range)(value?).ok())
        .map(|(_, port)| port)
}

/// A control request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub media: String,
    pub version: String,
    pub cseq: u32,
    pub session: Option<u32>,
    pub client_port: Option<u16>,
}

impl Request {
    pub fn new(method: Method, media: impl Into<String>, cseq: u32) -> Self {
        Self {
            method,
            media: media.into(),
            version: RTSP_VERSION.to_string(),
            cseq,
            session: None,
            client_port: None,
        }
    }

    pub fn with_session(mut self, session: u32) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_client_port(mut self, port: u16) -> Self {
        self.client_port = Some(port);
        self
    }

    /// Parse a complete request (request line, headers, blank line)
    pub fn parse(text: &str) -> Result<Self> {
        let (_, ((method, media, version), headers)) = message(request_line)(text)
            .map_err(|e| Error::MalformedRequest(format!("Invalid request: {}", describe(e))))?;

        let cseq = header(&headers, "CSeq")
            .ok_or_else(|| Error::MalformedRequest("Missing CSeq header".to_string()))?;
        let cseq = number::<u32>(cseq)
            .ok_or_else(|| Error::MalformedRequest(format!("Invalid CSeq: {:?}", cseq)))?;

        let session = header(&headers, "Session")
            .map(|value| {
                session_id(value)
                    .map(|(_, id)| id)
                    .map_err(|_| Error::MalformedRequest(format!("Invalid Session: {:?}", value)))
            })
            .transpose()?;

        let client_port = header(&headers, "Transport").and_then(parse_client_port);

        Ok(Self {
            method,
            media: media.to_string(),
            version: version.to_string(),
            cseq,
            session,
            client_port,
        })
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}\r\n", self.method, self.media, self.version)?;
        write!(f, "CSeq: {}\r\n", self.cseq)?;
        if let Some(port) = self.client_port {
            write!(f, "Transport: {}; client_port={}\r\n", TRANSPORT_PROFILE, port)?;
        }
        if let Some(session) = self.session {
            write!(f, "Session: {}\r\n", session)?;
        }
        f.write_str("\r\n")
    }
}

/// A control reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub version: String,
    pub status: StatusCode,
    pub reason: String,
    pub cseq: u32,
    pub session: Option<u32>,
}

impl Response {
    pub fn new(status: StatusCode, cseq: u32, session: Option<u32>) -> Self {
        Self {
            version: RTSP_VERSION.to_string(),
            status,
            reason: status.reason().to_string(),
            cseq,
            session,
        }
    }

    pub fn ok(cseq: u32, session: u32) -> Self {
        Self::new(StatusCode::OK, cseq, Some(session))
    }

    pub fn not_found(cseq: u32) -> Self {
        Self::new(StatusCode::NOT_FOUND, cseq, None)
    }

    /// Parse a complete reply (status line, headers, blank line)
    pub fn parse(text: &str) -> Result<Self> {
        let (_, ((version, code, reason), headers)) = message(status_line)(text)
            .map_err(|e| Error::MalformedResponse(format!("Invalid response: {}", describe(e))))?;

        let cseq = header(&headers, "CSeq")
            .ok_or_else(|| Error::MalformedResponse("Missing CSeq header".to_string()))?;
        let cseq = number::<u32>(cseq)
            .ok_or_else(|| Error::MalformedResponse(format!("Invalid CSeq: {:?}", cseq)))?;

        let session = header(&headers, "Session")
            .map(|value| {
                session_id(value)
                    .map(|(_, id)| id)
                    .map_err(|_| Error::MalformedResponse(format!("Invalid Session: {:?}", value)))
            })
            .transpose()?;

        Ok(Self {
            version: version.to_string(),
            status: StatusCode(code),
            reason: reason.trim().to_string(),
            cseq,
            session,
        })
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}\r\n", self.version, self.status.as_u16(), self.reason)?;
        write!(f, "CSeq: {}\r\n", self.cseq)?;
        if let Some(session) = self.session {
            write!(f, "Session: {}\r\n", session)?;
        }
        f.write_str("\r\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_request_wire_format() {
        let request = Request::new(Method::Setup, "clip.mjpeg", 1).with_client_port(25000);
        assert_eq!(
            request.to_string(),
            "SETUP clip.mjpeg RTSP/1.0\r\nCSeq: 1\r\nTransport: RTP/UDP; client_port=25000\r\n\r\n"
        );
        assert_eq!(Request::parse(&request.to_string()).unwrap(), request);
    }

    #[test]
    fn test_parse_lf_only_request() {
        let request = Request::parse("PLAY movie.Mjpeg RTSP/1.0\nCSeq: 3\nSession: 123456\n\n").unwrap();
        assert_eq!(request.method, Method::Play);
        assert_eq!(request.media, "movie.Mjpeg");
        assert_eq!(request.cseq, 3);
        assert_eq!(request.session, Some(123456));
        assert_eq!(request.client_port, None);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(Request::parse(""), Err(Error::MalformedRequest(_))));
        assert!(matches!(Request::parse("PLAY\r\n\r\n"), Err(Error::MalformedRequest(_))));
        assert!(matches!(
            Request::parse("RECORD a RTSP/1.0\r\nCSeq: 1\r\n\r\n"),
            Err(Error::MalformedRequest(_))
        ));
        assert!(matches!(
            Request::parse("PLAY a RTSP/1.0\r\n\r\n"),
            Err(Error::MalformedRequest(_))
        ));
        assert!(matches!(
            Request::parse("PLAY a RTSP/1.0\r\nCSeq: x\r\n\r\n"),
            Err(Error::MalformedRequest(_))
        ));
    }

    #[test]
    fn test_parse_tolerates_spacing_and_parameters() {
        let request = Request::parse(
            "\r\nTEARDOWN  clip  RTSP/1.0 \r\ncseq :  12 \r\nSession: 654321;timeout=60\r\n\r\n",
        )
        .unwrap();
        assert_eq!(request.method, Method::Teardown);
        assert_eq!(request.media, "clip");
        assert_eq!(request.cseq, 12);
        assert_eq!(request.session, Some(654321));
    }

    #[test]
    fn test_parse_rejects_bad_lines() {
        // Extra token on the request line
        assert!(matches!(
            Request::parse("PLAY a RTSP/1.0 extra\r\nCSeq: 1\r\n\r\n"),
            Err(Error::MalformedRequest(_))
        ));
        // Header without a colon
        assert!(matches!(
            Request::parse("PLAY a RTSP/1.0\r\nCSeq 1\r\n\r\n"),
            Err(Error::MalformedRequest(_))
        ));
        assert!(matches!(
            Request::parse("PLAY a RTSP/1.0\r\nCSeq: 1\r\nSession: 12ab\r\n\r\n"),
            Err(Error::MalformedRequest(_))
        ));
    }

    #[test]
    fn test_status_line_without_reason() {
        let reply = Response::parse("RTSP/1.0 200\nCSeq: 4\n\n").unwrap();
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.reason, "");
        assert_eq!(reply.cseq, 4);
        assert!(matches!(Response::parse("RTSP/1.0 200OK\r\nCSeq: 1\r\n\r\n"), Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn test_client_port_variants() {
        assert_eq!(parse_client_port("RTP/UDP; client_port=25000"), Some(25000));
        assert_eq!(parse_client_port("RTP/AVP;unicast;client_port=4588-4589"), Some(4588));
        assert_eq!(parse_client_port("RTP/UDP"), None);
        assert_eq!(parse_client_port("RTP/UDP; client_port=abc"), None);
        assert_eq!(parse_client_port("RTP/UDP; client_port"), None);
        assert_eq!(parse_client_port("RTP/UDP;CLIENT_PORT = 6000 ;mode=play"), Some(6000));
    }

    #[test]
    fn test_response_round_trip() {
        let ok = Response::ok(7, 424242);
        assert_eq!(ok.to_string(), "RTSP/1.0 200 OK\r\nCSeq: 7\r\nSession: 424242\r\n\r\n");
        assert_eq!(Response::parse(&ok.to_string()).unwrap(), ok);

        let missing = Response::not_found(2);
        assert_eq!(missing.to_string(), "RTSP/1.0 404 Not Found\r\nCSeq: 2\r\n\r\n");
        let parsed = Response::parse(&missing.to_string()).unwrap();
        assert_eq!(parsed.status, StatusCode::NOT_FOUND);
        assert_eq!(parsed.session, None);
    }

    #[test]
    fn test_internal_error_is_representable() {
        let reply = Response::new(StatusCode::INTERNAL_SERVER_ERROR, 9, Some(1));
        let parsed = Response::parse(&reply.to_string()).unwrap();
        assert_eq!(parsed.status.as_u16(), 500);
        assert_eq!(parsed.reason, "Internal Server Error");
        assert!(!parsed.status.is_success());
    }

    #[test]
    fn test_response_parse_errors() {
        assert!(matches!(Response::parse("HTTP/1.1 200 OK\r\nCSeq: 1\r\n\r\n"), Err(Error::MalformedResponse(_))));
        assert!(matches!(Response::parse("RTSP/1.0 abc OK\r\nCSeq: 1\r\n\r\n"), Err(Error::MalformedResponse(_))));
        assert!(matches!(Response::parse("RTSP/1.0 200 OK\r\n\r\n"), Err(Error::MalformedResponse(_))));
    }
}
