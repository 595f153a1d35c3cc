use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Symbol kinds reported by the indexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymbolKind {
    Class,
    Protocol,
    Struct,
    Union,
    Enum,
    EnumConstant,
    Field,
    Property,
    InstanceMethod,
    ClassMethod,
    StaticMethod,
    Function,
    Variable,
    TypeAlias,
    Macro,
    Extension,
    Unknown,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Protocol => "protocol",
            Self::Struct => "struct",
            Self::Union => "union",
            Self::Enum => "enum",
            Self::EnumConstant => "enum-constant",
            Self::Field => "field",
            Self::Property => "property",
            Self::InstanceMethod => "instance-method",
            Self::ClassMethod => "class-method",
            Self::StaticMethod => "static-method",
            Self::Function => "function",
            Self::Variable => "variable",
            Self::TypeAlias => "type-alias",
            Self::Macro => "macro",
            Self::Extension => "extension",
            Self::Unknown => "unknown",
        }
    }

    /// Unrecognized names map to `Unknown`
    pub fn from_str(s: &str) -> Self {
        match s {
            "class" => Self::Class,
            "protocol" => Self::Protocol,
            "struct" => Self::Struct,
            "union" => Self::Union,
            "enum" => Self::Enum,
            "enum-constant" => Self::EnumConstant,
            "field" => Self::Field,
            "property" => Self::Property,
            "instance-method" => Self::InstanceMethod,
            "class-method" => Self::ClassMethod,
            "static-method" => Self::StaticMethod,
            "function" => Self::Function,
            "variable" => Self::Variable,
            "type-alias" => Self::TypeAlias,
            "macro" => Self::Macro,
            "extension" => Self::Extension,
            _ => Self::Unknown,
        }
    }

    /// Instance, class and static methods
    pub fn is_method(&self) -> bool {
        matches!(
            self,
            Self::InstanceMethod | Self::ClassMethod | Self::StaticMethod
        )
    }
}

/// Bit set of occurrence / relation roles
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolRoles(u32);

impl SymbolRoles {
    pub const NONE: Self = Self(0);
    pub const DECLARATION: Self = Self(1 << 0);
    pub const DEFINITION: Self = Self(1 << 1);
    pub const REFERENCE: Self = Self(1 << 2);
    pub const CALL: Self = Self(1 << 3);
    pub const CANONICAL: Self = Self(1 << 4);
    pub const BASE_OF: Self = Self(1 << 5);
    pub const EXTENDED_BY: Self = Self(1 << 6);
    pub const CONTAINED_BY: Self = Self(1 << 7);
    pub const OVERRIDE_OF: Self = Self(1 << 8);

    const NAMES: [(Self, &'static str); 9] = [
        (Self::DECLARATION, "declaration"),
        (Self::DEFINITION, "definition"),
        (Self::REFERENCE, "reference"),
        (Self::CALL, "call"),
        (Self::CANONICAL, "canonical"),
        (Self::BASE_OF, "base-of"),
        (Self::EXTENDED_BY, "extended-by"),
        (Self::CONTAINED_BY, "contained-by"),
        (Self::OVERRIDE_OF, "override-of"),
    ];

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// All bits of `other` are set
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// At least one bit of `other` is set
    pub const fn intersects(&self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for SymbolRoles {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for SymbolRoles {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for SymbolRoles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(role, _)| self.contains(*role))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "SymbolRoles[{}]", names.join("|"))
    }
}

/// A symbol, identified by its USR
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    pub usr: String,
    pub name: String,
    pub kind: SymbolKind,
}

impl Symbol {
    pub fn new(usr: impl Into<String>, name: impl Into<String>, kind: SymbolKind) -> Self {
        Self {
            usr: usr.into(),
            name: name.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolLocation {
    pub path: String,
    pub line: u32,
    pub column: u32,
}

/// Relation from an occurrence to another symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRelation {
    pub roles: SymbolRoles,
    pub symbol: Symbol,
}

/// One appearance of a symbol in the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolOccurrence {
    pub symbol: Symbol,
    pub location: SymbolLocation,
    pub roles: SymbolRoles,
    #[serde(default)]
    pub relations: Vec<SymbolRelation>,
}

impl SymbolOccurrence {
    /// Whether this occurrence relates to `usr` through any of `roles`
    pub fn is_related_to(&self, usr: &str, roles: SymbolRoles) -> bool {
        self.relations
            .iter()
            .any(|r| r.symbol.usr == usr && r.roles.intersects(roles))
    }
}

/// Include directive recorded for a compilation unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitInclude {
    pub source_path: String,
    pub target_path: String,
    pub line: u32,
}

impl UnitInclude {
    pub fn new(source_path: impl Into<String>, target_path: impl Into<String>, line: u32) -> Self {
        Self {
            source_path: source_path.into(),
            target_path: target_path.into(),
            line,
        }
    }
}

/// Compilation unit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub name: String,
    pub main_file: String,
    /// Unix milliseconds of the last (re)index
    #[serde(default)]
    pub modified_at: Option<i64>,
    #[serde(default)]
    pub includes: Vec<UnitInclude>,
}

impl UnitRecord {
    /// Whether the unit's main file or any of its includes is `path`
    pub fn references_file(&self, path: &str) -> bool {
        self.main_file == path
            || self
                .includes
                .iter()
                .any(|inc| inc.source_path == path || inc.target_path == path)
    }
}
