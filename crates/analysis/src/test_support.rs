//! Index fixtures shared by unit tests

use index::{
    MemoryIndex, Symbol, SymbolKind, SymbolLocation, SymbolOccurrence, SymbolRelation,
    SymbolRoles, UnitInclude, UnitRecord,
};

pub const F: &str = "/proj/F.m";
pub const A_H: &str = "/proj/A.h";
pub const B_H: &str = "/proj/B.h";
pub const C_H: &str = "/proj/C.h";
pub const H_H: &str = "/proj/H.h";
pub const CAT_H: &str = "/proj/Foo+Cat.h";
pub const PROP_H: &str = "/proj/Foo+Props.h";
pub const METHOD_H: &str = "/proj/Foo+Methods.h";

pub fn unit(
    name: &str,
    main_file: &str,
    modified_at: Option<i64>,
    includes: &[(&str, &str, u32)],
) -> UnitRecord {
    UnitRecord {
        name: name.to_string(),
        main_file: main_file.to_string(),
        modified_at,
        includes: includes
            .iter()
            .map(|(source, target, line)| UnitInclude::new(*source, *target, *line))
            .collect(),
    }
}

pub fn occurrence(
    usr: &str,
    name: &str,
    kind: SymbolKind,
    path: &str,
    roles: SymbolRoles,
) -> SymbolOccurrence {
    SymbolOccurrence {
        symbol: Symbol::new(usr, name, kind),
        location: SymbolLocation {
            path: path.to_string(),
            line: 1,
            column: 1,
        },
        roles,
        relations: Vec::new(),
    }
}

pub fn declare(index: &mut MemoryIndex, usr: &str, name: &str, kind: SymbolKind, path: &str) {
    index.add_occurrence(occurrence(
        usr,
        name,
        kind,
        path,
        SymbolRoles::DECLARATION | SymbolRoles::CANONICAL,
    ));
}

pub fn reference(index: &mut MemoryIndex, usr: &str, name: &str, kind: SymbolKind, path: &str) {
    index.add_occurrence(occurrence(usr, name, kind, path, SymbolRoles::REFERENCE));
}

/// `extended_usr` is extended by the extension `extension_usr` in `path`
pub fn extension_of(
    extended_usr: &str,
    extended_name: &str,
    extension_usr: &str,
    path: &str,
) -> SymbolOccurrence {
    let mut occ = occurrence(
        extended_usr,
        extended_name,
        SymbolKind::Class,
        path,
        SymbolRoles::REFERENCE | SymbolRoles::EXTENDED_BY,
    );
    occ.relations.push(SymbolRelation {
        roles: SymbolRoles::EXTENDED_BY,
        symbol: Symbol::new(extension_usr, extended_name, SymbolKind::Extension),
    });
    occ
}

/// The extension `extension_usr` declares the protocol `protocol_usr` as a base
pub fn conforms_to(
    index: &mut MemoryIndex,
    extension_usr: &str,
    protocol_usr: &str,
    protocol_name: &str,
    path: &str,
) {
    let mut occ = occurrence(
        protocol_usr,
        protocol_name,
        SymbolKind::Protocol,
        path,
        SymbolRoles::REFERENCE | SymbolRoles::BASE_OF,
    );
    occ.relations.push(SymbolRelation {
        roles: SymbolRoles::BASE_OF,
        symbol: Symbol::new(extension_usr, "", SymbolKind::Extension),
    });
    index.add_occurrence(occ);
}

/// Declaration of `usr` in `path`, contained by `owner_usr`
pub fn member_of(
    index: &mut MemoryIndex,
    owner_usr: &str,
    usr: &str,
    name: &str,
    kind: SymbolKind,
    path: &str,
) {
    let mut occ = occurrence(
        usr,
        name,
        kind,
        path,
        SymbolRoles::DECLARATION | SymbolRoles::CANONICAL,
    );
    occ.relations.push(SymbolRelation {
        roles: SymbolRoles::CONTAINED_BY,
        symbol: Symbol::new(owner_usr, "", SymbolKind::Class),
    });
    index.add_occurrence(occ);
}
