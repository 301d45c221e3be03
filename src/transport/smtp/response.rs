//! SMTP replies: a three digit code and one or more text lines

use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use nom::{
    bytes::streaming::{tag, take_until},
    character::streaming::one_of,
    combinator::{complete, map_opt},
    multi::many0,
    sequence::preceded,
    IResult, Parser,
};

use crate::transport::smtp::{error, Error};

/// First digit of a reply code
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum Severity {
    /// 2yz
    PositiveCompletion = 2,
    /// 3yz
    PositiveIntermediate = 3,
    /// 4yz
    TransientNegativeCompletion = 4,
    /// 5yz
    PermanentNegativeCompletion = 5,
}

impl Severity {
    fn from_digit(digit: char) -> Option<Self> {
        Some(match digit {
            '2' => Severity::PositiveCompletion,
            '3' => Severity::PositiveIntermediate,
            '4' => Severity::TransientNegativeCompletion,
            '5' => Severity::PermanentNegativeCompletion,
            _ => return None,
        })
    }
}

/// Second digit of a reply code
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum Category {
    /// x0z
    Syntax = 0,
    /// x1z
    Information = 1,
    /// x2z
    Connections = 2,
    /// x3z
    Unspecified3 = 3,
    /// x4z
    Unspecified4 = 4,
    /// x5z
    MailSystem = 5,
}

impl Category {
    fn from_digit(digit: char) -> Option<Self> {
        Some(match digit {
            '0' => Category::Syntax,
            '1' => Category::Information,
            '2' => Category::Connections,
            '3' => Category::Unspecified3,
            '4' => Category::Unspecified4,
            '5' => Category::MailSystem,
            _ => return None,
        })
    }
}

/// Third digit of a reply code
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[allow(missing_docs)]
pub enum Detail {
    Zero = 0,
    One = 1,
    Two = 2,
    Three = 3,
    Four = 4,
    Five = 5,
    Six = 6,
    Seven = 7,
    Eight = 8,
    Nine = 9,
}

impl Detail {
    const ALL: [Detail; 10] = [
        Detail::Zero,
        Detail::One,
        Detail::Two,
        Detail::Three,
        Detail::Four,
        Detail::Five,
        Detail::Six,
        Detail::Seven,
        Detail::Eight,
        Detail::Nine,
    ];

    fn from_digit(digit: char) -> Option<Self> {
        digit
            .to_digit(10)
            .and_then(|d| Self::ALL.get(d as usize).copied())
    }
}

/// A three digit SMTP reply code
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct Code {
    /// First digit
    pub severity: Severity,
    /// Second digit
    pub category: Category,
    /// Third digit
    pub detail: Detail,
}

impl Display for Code {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u16::from(*self))
    }
}

impl Code {
    /// Creates a new `Code`
    pub fn new(severity: Severity, category: Category, detail: Detail) -> Code {
        Code {
            severity,
            category,
            detail,
        }
    }

    /// Tells if the code is a 2yz or a 3yz one
    pub fn is_positive(self) -> bool {
        matches!(
            self.severity,
            Severity::PositiveCompletion | Severity::PositiveIntermediate
        )
    }
}

impl From<Code> for u16 {
    fn from(code: Code) -> Self {
        code.detail as u16 + 10 * code.category as u16 + 100 * code.severity as u16
    }
}

/// A complete, possibly multi-line, SMTP reply
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Response {
    code: Code,
    /// One entry per reply line, without the code and separator
    message: Vec<String>,
}

impl FromStr for Response {
    type Err = Error;

    fn from_str(s: &str) -> Result<Response, Error> {
        parse_response(s)
            .map(|(_, r)| r)
            .map_err(|e| error::response(e.to_owned()))
    }
}

impl Response {
    /// Creates a new `Response`
    pub fn new(code: Code, message: Vec<String>) -> Response {
        Response { code, message }
    }

    /// Tells if the reply is positive
    pub fn is_positive(&self) -> bool {
        self.code.is_positive()
    }

    /// Tests code equality
    pub fn has_code(&self, code: u16) -> bool {
        u16::from(self.code) == code
    }

    /// First word of the first line, if any
    ///
    /// For an EHLO reply this is the server name, for a 334 reply the
    /// base64 encoded challenge.
    pub fn first_word(&self) -> Option<&str> {
        self.message
            .first()
            .and_then(|line| line.split_whitespace().next())
    }

    /// First line of the reply text
    pub fn first_line(&self) -> Option<&str> {
        self.message.first().map(String::as_str)
    }

    /// Reply code
    pub fn code(&self) -> Code {
        self.code
    }

    /// Reply text, line by line
    pub fn message(&self) -> impl Iterator<Item = &str> {
        self.message.iter().map(String::as_str)
    }
}

fn parse_code(i: &str) -> IResult<&str, Code> {
    let (i, severity) = map_opt(one_of("2345"), Severity::from_digit).parse(i)?;
    let (i, category) = map_opt(one_of("012345"), Category::from_digit).parse(i)?;
    let (i, detail) = map_opt(one_of("0123456789"), Detail::from_digit).parse(i)?;
    Ok((i, Code::new(severity, category, detail)))
}

/// Parses one reply
///
/// Returns `nom::Err::Incomplete` while the final `xyz <text>\r\n` line has
/// not been received.
pub(crate) fn parse_response(i: &str) -> IResult<&str, Response> {
    let (i, lines) = many0((
        parse_code,
        preceded(tag("-"), take_until("\r\n")),
        tag("\r\n"),
    ))
    .parse(i)?;
    let (i, (last_code, last_line)) =
        (parse_code, preceded(tag(" "), take_until("\r\n"))).parse(i)?;
    let (i, _) = complete(tag("\r\n")).parse(i)?;

    // every line of a multi-line reply carries the same code
    if lines.iter().any(|&(code, _, _)| code != last_code) {
        return Err(nom::Err::Failure(nom::error::Error::new(
            "",
            nom::error::ErrorKind::Not,
        )));
    }

    let mut message: Vec<String> = lines.into_iter().map(|(_, text, _)| text.into()).collect();
    message.push(last_line.into());

    Ok((
        i,
        Response {
            code: last_code,
            message,
        },
    ))
}
