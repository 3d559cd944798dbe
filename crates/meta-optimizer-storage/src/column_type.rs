use std::fmt;

/// Longest value a `VARCHAR` column may be declared for.
pub const MAX_VARCHAR_LENGTH: u32 = 65_535;

/// SQL column types the optimizer declares or recognizes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnType {
    TinyInt,
    SmallInt,
    MediumInt,
    Int,
    BigInt,
    Float,
    Double,
    Decimal,
    Char(u32),
    Varchar(u32),
    TinyText,
    Text,
    MediumText,
    LongText,
    Date,
    DateTime,
    Timestamp,
    Time,
    Year,
    /// A declared type this crate does not manage; never promoted.
    Other(String),
}

/// Families of the promotion lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    Integer,
    Float,
    Text,
    Temporal,
    Other,
}

const INTEGER_TIERS: [ColumnType; 5] = [
    ColumnType::TinyInt,
    ColumnType::SmallInt,
    ColumnType::MediumInt,
    ColumnType::Int,
    ColumnType::BigInt,
];

impl ColumnType {
    pub fn family(&self) -> TypeFamily {
        match self {
            ColumnType::TinyInt
            | ColumnType::SmallInt
            | ColumnType::MediumInt
            | ColumnType::Int
            | ColumnType::BigInt => TypeFamily::Integer,
            ColumnType::Float | ColumnType::Double | ColumnType::Decimal => TypeFamily::Float,
            ColumnType::Char(_)
            | ColumnType::Varchar(_)
            | ColumnType::TinyText
            | ColumnType::Text
            | ColumnType::MediumText
            | ColumnType::LongText => TypeFamily::Text,
            ColumnType::Date
            | ColumnType::DateTime
            | ColumnType::Timestamp
            | ColumnType::Time
            | ColumnType::Year => TypeFamily::Temporal,
            ColumnType::Other(_) => TypeFamily::Other,
        }
    }

    /// Position inside the family, smallest capacity first.
    pub fn tier(&self) -> usize {
        match self {
            ColumnType::TinyInt | ColumnType::Float | ColumnType::Char(_) => 0,
            ColumnType::SmallInt | ColumnType::Double | ColumnType::Varchar(_) => 1,
            ColumnType::MediumInt | ColumnType::Decimal | ColumnType::TinyText => 2,
            ColumnType::Int | ColumnType::Text => 3,
            ColumnType::BigInt | ColumnType::MediumText => 4,
            ColumnType::LongText => 5,
            ColumnType::Date
            | ColumnType::DateTime
            | ColumnType::Timestamp
            | ColumnType::Time
            | ColumnType::Year
            | ColumnType::Other(_) => 0,
        }
    }

    /// Same type ignoring the size parameter.
    pub fn same_category(&self, other: &ColumnType) -> bool {
        match (self, other) {
            (ColumnType::Char(_), ColumnType::Char(_)) => true,
            (ColumnType::Varchar(_), ColumnType::Varchar(_)) => true,
            (ColumnType::Other(a), ColumnType::Other(b)) => a.eq_ignore_ascii_case(b),
            (a, b) => a == b,
        }
    }

    pub fn is_wide_string(&self) -> bool {
        matches!(self, ColumnType::Varchar(_))
    }

    /// Declared size of sized string types.
    pub fn size(&self) -> Option<u32> {
        match self {
            ColumnType::Char(n) | ColumnType::Varchar(n) => Some(*n),
            _ => None,
        }
    }

    /// Smallest integer type holding `value`.
    pub fn for_integer(value: i64) -> ColumnType {
        let tier = if (-128..=127).contains(&value) {
            0
        } else if (-32_768..=32_767).contains(&value) {
            1
        } else if (-8_388_608..=8_388_607).contains(&value) {
            2
        } else if (i64::from(i32::MIN)..=i64::from(i32::MAX)).contains(&value) {
            3
        } else {
            4
        };
        INTEGER_TIERS[tier].clone()
    }

    /// `VARCHAR(len)` while the length fits, `TEXT` beyond.
    pub fn for_text_length(len: usize) -> ColumnType {
        match u32::try_from(len) {
            Ok(n) if n <= MAX_VARCHAR_LENGTH => ColumnType::Varchar(n.max(1)),
            _ => ColumnType::Text,
        }
    }

    /// Parse a declared column type as reported by the store (`VARCHAR(20)`,
    /// `int(11) unsigned`, `TEXT`...).
    pub fn parse_declared(declared: &str) -> ColumnType {
        let upper = declared.trim().to_ascii_uppercase();
        let (name, args) = match upper.find('(') {
            Some(open) => {
                let close = upper[open..].find(')').map_or(upper.len(), |i| open + i);
                (upper[..open].trim(), Some(upper[open + 1..close].trim()))
            }
            None => (upper.split_whitespace().next().unwrap_or(""), None),
        };
        let size = args
            .and_then(|a| a.split(',').next())
            .and_then(|n| n.trim().parse::<u32>().ok());

        match name {
            "TINYINT" | "BOOL" | "BOOLEAN" => ColumnType::TinyInt,
            "SMALLINT" => ColumnType::SmallInt,
            "MEDIUMINT" => ColumnType::MediumInt,
            "INT" | "INTEGER" => ColumnType::Int,
            "BIGINT" => ColumnType::BigInt,
            "FLOAT" | "REAL" => ColumnType::Float,
            "DOUBLE" | "DOUBLE PRECISION" => ColumnType::Double,
            "DECIMAL" | "NUMERIC" => ColumnType::Decimal,
            "CHAR" => ColumnType::Char(size.unwrap_or(1)),
            "VARCHAR" => ColumnType::Varchar(size.unwrap_or(MAX_VARCHAR_LENGTH)),
            "TINYTEXT" => ColumnType::TinyText,
            "TEXT" => ColumnType::Text,
            "MEDIUMTEXT" => ColumnType::MediumText,
            "LONGTEXT" => ColumnType::LongText,
            "DATE" => ColumnType::Date,
            "DATETIME" => ColumnType::DateTime,
            "TIMESTAMP" => ColumnType::Timestamp,
            "TIME" => ColumnType::Time,
            "YEAR" => ColumnType::Year,
            _ => ColumnType::Other(declared.trim().to_string()),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::TinyInt => f.write_str("TINYINT"),
            ColumnType::SmallInt => f.write_str("SMALLINT"),
            ColumnType::MediumInt => f.write_str("MEDIUMINT"),
            ColumnType::Int => f.write_str("INT"),
            ColumnType::BigInt => f.write_str("BIGINT"),
            ColumnType::Float => f.write_str("FLOAT"),
            ColumnType::Double => f.write_str("DOUBLE"),
            ColumnType::Decimal => f.write_str("DECIMAL"),
            ColumnType::Char(n) => write!(f, "CHAR({n})"),
            ColumnType::Varchar(n) => write!(f, "VARCHAR({n})"),
            ColumnType::TinyText => f.write_str("TINYTEXT"),
            ColumnType::Text => f.write_str("TEXT"),
            ColumnType::MediumText => f.write_str("MEDIUMTEXT"),
            ColumnType::LongText => f.write_str("LONGTEXT"),
            ColumnType::Date => f.write_str("DATE"),
            ColumnType::DateTime => f.write_str("DATETIME"),
            ColumnType::Timestamp => f.write_str("TIMESTAMP"),
            ColumnType::Time => f.write_str("TIME"),
            ColumnType::Year => f.write_str("YEAR"),
            ColumnType::Other(declared) => f.write_str(declared),
        }
    }
}

/// A dynamic column: a storage name plus the type observed data requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}
