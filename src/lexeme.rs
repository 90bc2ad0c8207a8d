/// All lexemes in the ward rule language.
#[derive(Clone, Debug, PartialEq)]
pub enum Lexeme {
    // Keywords
    Rule,
    Enum,
    Set,
    Pub,
    Priv,
    In,
    And,
    Or,
    Not,
    True,
    False,

    // Symbols
    LParen, // (
    RParen, // )
    LBrace, // {
    RBrace, // }
    Comma,  // ,
    Colon,  // :
    EqEq,   // ==
    BangEq, // !=
    Lt,     // <
    Le,     // <=
    Gt,     // >
    Ge,     // >=
    Plus,   // +
    Minus,  // -
    Star,   // *
    Slash,  // /

    // Literals
    Integer(u64),
    Ident(String),

    // End of file
    Eof,
}

impl Lexeme {
    /// Try to match an identifier string to a keyword lexeme.
    pub fn from_keyword(s: &str) -> Option<Lexeme> {
        match s {
            "rule" => Some(Lexeme::Rule),
            "enum" => Some(Lexeme::Enum),
            "set" => Some(Lexeme::Set),
            "pub" => Some(Lexeme::Pub),
            "priv" => Some(Lexeme::Priv),
            "in" => Some(Lexeme::In),
            "and" => Some(Lexeme::And),
            "or" => Some(Lexeme::Or),
            "not" => Some(Lexeme::Not),
            "true" => Some(Lexeme::True),
            "false" => Some(Lexeme::False),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Lexeme::Rule => "'rule'",
            Lexeme::Enum => "'enum'",
            Lexeme::Set => "'set'",
            Lexeme::Pub => "'pub'",
            Lexeme::Priv => "'priv'",
            Lexeme::In => "'in'",
            Lexeme::And => "'and'",
            Lexeme::Or => "'or'",
            Lexeme::Not => "'not'",
            Lexeme::True => "'true'",
            Lexeme::False => "'false'",
            Lexeme::LParen => "'('",
            Lexeme::RParen => "')'",
            Lexeme::LBrace => "'{'",
            Lexeme::RBrace => "'}'",
            Lexeme::Comma => "','",
            Lexeme::Colon => "':'",
            Lexeme::EqEq => "'=='",
            Lexeme::BangEq => "'!='",
            Lexeme::Lt => "'<'",
            Lexeme::Le => "'<='",
            Lexeme::Gt => "'>'",
            Lexeme::Ge => "'>='",
            Lexeme::Plus => "'+'",
            Lexeme::Minus => "'-'",
            Lexeme::Star => "'*'",
            Lexeme::Slash => "'/'",
            Lexeme::Integer(_) => "integer literal",
            Lexeme::Ident(_) => "identifier",
            Lexeme::Eof => "end of file",
        }
    }
}
