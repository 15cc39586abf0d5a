//! Known AMOS extension libraries.
//!
//! Libraries are identified by the MD5 of their file. A definition may
//! extend an earlier version of the same library, listing only what changed;
//! [`Registry`] flattens those chains once when it is built.

use crate::error::{AmosError, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Which AMOS flavour a library was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LibraryKind {
    /// AMOS 1.3 / AMOS Creator
    Creator,
    /// AMOS Professional
    Pro,
}

/// A library definition as written, possibly relative to a base.
#[derive(Debug, Clone, Copy)]
pub struct LibraryDef {
    pub md5: &'static str,
    pub kind: LibraryKind,
    pub name: &'static str,
    pub version: &'static str,
    /// MD5 of the definition this one extends
    pub extends: Option<&'static str>,
    /// Routines of the base that no longer exist
    pub removed: &'static [&'static str],
    /// Base routines that changed name, old to new
    pub renamed: &'static [(&'static str, &'static str)],
    /// Routines with identical code, alias to original
    pub same: &'static [(&'static str, &'static str)],
    pub routines: &'static [(&'static str, u16)],
}

impl LibraryDef {
    const fn new(
        md5: &'static str,
        kind: LibraryKind,
        name: &'static str,
        version: &'static str,
        routines: &'static [(&'static str, u16)],
    ) -> Self {
        LibraryDef {
            md5,
            kind,
            name,
            version,
            extends: None,
            removed: &[],
            renamed: &[],
            same: &[],
            routines,
        }
    }

    const fn extending(mut self, base: &LibraryDef) -> Self {
        self.extends = Some(base.md5);
        self
    }
}

/// A library with its inheritance chain applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedLibrary {
    pub md5: String,
    pub kind: LibraryKind,
    pub name: String,
    pub version: String,
    /// Routine numbers by name
    pub routines: BTreeMap<String, u16>,
    pub same: BTreeMap<String, String>,
    /// MD5s of the definitions that were merged, base first
    pub chain: Vec<String>,
}

impl ResolvedLibrary {
    /// Name of a routine number.
    pub fn routine_name(&self, number: u16) -> Option<&str> {
        self.routines
            .iter()
            .find(|&(_, &n)| n == number)
            .map(|(name, _)| name.as_str())
    }
}

/// Read-only table of known libraries.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    libraries: HashMap<String, ResolvedLibrary>,
}

impl Registry {
    /// The built-in definitions.
    pub fn builtin() -> Result<Self> {
        Self::from_defs(BUILTIN)
    }

    /// Resolve a set of definitions. Every base must be part of the set and
    /// chains must not loop.
    pub fn from_defs(defs: &[LibraryDef]) -> Result<Self> {
        let by_md5: HashMap<&str, &LibraryDef> = defs.iter().map(|d| (d.md5, d)).collect();
        if by_md5.len() != defs.len() {
            return Err(AmosError::RegistryError {
                message: "duplicate library MD5".to_string(),
            });
        }

        let mut libraries = HashMap::with_capacity(defs.len());
        for def in defs {
            let resolved = resolve(def, &by_md5)?;
            libraries.insert(def.md5.to_string(), resolved);
        }
        tracing::debug!(libraries = libraries.len(), "library registry built");
        Ok(Registry { libraries })
    }

    /// Look up a library by the lowercase hex MD5 of its file.
    pub fn lookup(&self, md5: &str) -> Option<&ResolvedLibrary> {
        self.libraries.get(md5)
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedLibrary> {
        self.libraries.values()
    }
}

/// Definitions from `def` down to the root of its chain.
fn chain<'a>(def: &'a LibraryDef, by_md5: &HashMap<&str, &'a LibraryDef>) -> Result<Vec<&'a LibraryDef>> {
    let mut chain = vec![def];
    let mut current = def;
    while let Some(base) = current.extends {
        let next = *by_md5.get(base).ok_or_else(|| AmosError::RegistryError {
            message: format!("{} {} extends unknown library {}", def.name, def.version, base),
        })?;
        if chain.iter().any(|d| d.md5 == next.md5) {
            return Err(AmosError::RegistryError {
                message: format!("{} {} has a cyclic extends chain", def.name, def.version),
            });
        }
        chain.push(next);
        current = next;
    }
    Ok(chain)
}

fn resolve(def: &LibraryDef, by_md5: &HashMap<&str, &LibraryDef>) -> Result<ResolvedLibrary> {
    let links = chain(def, by_md5)?;

    let mut routines = BTreeMap::new();
    let mut same = BTreeMap::new();
    for link in links.iter().rev() {
        for name in link.removed {
            routines.remove(*name);
        }
        for (old, new) in link.renamed {
            if let Some(number) = routines.remove(*old) {
                routines.insert(new.to_string(), number);
            }
        }
        for (name, number) in link.routines {
            routines.insert(name.to_string(), *number);
        }
        for (alias, original) in link.same {
            same.insert(alias.to_string(), original.to_string());
        }
    }

    Ok(ResolvedLibrary {
        md5: def.md5.to_string(),
        kind: def.kind,
        name: def.name.to_string(),
        version: def.version.to_string(),
        routines,
        same,
        chain: links.iter().rev().map(|d| d.md5.to_string()).collect(),
    })
}

/// An AMOS Professional extension and the slot it loads into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtensionSlot {
    pub name: &'static str,
    pub version: &'static str,
    pub slot: u8,
}

const SLOTS: &[(&str, ExtensionSlot)] = &[
    ("ab1d615bde71d06d53de098768e5384e", ExtensionSlot { name: "Core", version: "ProV2", slot: 0 }),
    ("ddf2f65aaa9df85d642317e199105d53", ExtensionSlot { name: "Music", version: "ProV2", slot: 1 }),
    ("57e035efd4d37cb5504bd7d619a99933", ExtensionSlot { name: "Compact", version: "ProV2", slot: 2 }),
    ("7d3df35f6a37886c2d4c84542b9300e0", ExtensionSlot { name: "Requester", version: "ProV2", slot: 3 }),
    ("241e45afbbad3871e5dad9135dacd1cb", ExtensionSlot { name: "IOPorts", version: "ProV2", slot: 6 }),
    ("18ed1e8c39eb633bd26a5da129002a64", ExtensionSlot { name: "OpalVision", version: "V1.1", slot: 21 }),
];

/// Extension slot of a known library file.
pub fn extension_slot(md5: &str) -> Option<ExtensionSlot> {
    SLOTS.iter().find(|(hash, _)| *hash == md5).map(|(_, slot)| *slot)
}

mod known {
    use super::LibraryDef;
    use super::LibraryKind::{Creator, Pro};

    pub const MAKE_V1_20: LibraryDef = LibraryDef::new(
        "c454b95d20ddc13920cc963a88895c2a",
        Pro,
        "Make",
        "V1_20",
        &[
            ("MaAddhead", 7),
            ("MaAddtail", 9),
            ("MaAllocmem", 4),
            ("MaAllocvec", 11),
            ("MaExtb", 21),
            ("MaExtw", 22),
            ("MaFilelen", 20),
            ("MaFirst", 18),
            ("MaFree", 14),
            ("MaFreeAll", 15),
            ("MaFreemem", 5),
            ("MaFreevec", 12),
            ("MaLast", 19),
            ("MaMalloc", 13),
            ("MaNewlist", 6),
            ("MaNext", 16),
            ("MaPasteIcon", 23),
            ("MaPlot", 25),
            ("MaPoint", 24),
            ("MaPrev", 17),
            ("MaRemhead", 10),
            ("MaRemove", 8),
            ("MemChip", 26),
            ("MemClear", 28),
            ("MemFast", 27),
            ("MemPublic", 29),
        ],
    );

    pub const MAKE_V1_30: LibraryDef = LibraryDef::new(
        "39ad8fe2a2eedaf497776fb498602c3d",
        Pro,
        "Main",
        "V1_30",
        &[
            ("MaFclose", 31),
            ("MaFopen", 30),
            ("MaFread", 33),
            ("MaFseek", 34),
            ("MaFwrite", 32),
            ("MaRealloc", 35),
        ],
    )
    .extending(&MAKE_V1_20);

    pub const COMPACT_PRO_V2_00: LibraryDef = LibraryDef::new(
        "57e035efd4d37cb5504bd7d619a99933",
        Pro,
        "Compact",
        "V2_00",
        &[
            ("Pack_II", 2),
            ("Pack_IIIIII", 3),
            ("Spack_II", 4),
            ("Spack_IIIIII", 5),
            ("Unpack_I", 6),
            ("Unpack_II", 9),
            ("Unpack_III", 7),
        ],
    );

    pub const REQUESTER_PRO_V2_00: LibraryDef = LibraryDef::new(
        "7d3df35f6a37886c2d4c84542b9300e0",
        Pro,
        "Requester",
        "V2_00",
        &[("RequestWb", 2), ("RequestOn", 3), ("RequestOff", 4)],
    );

    pub const TOOLS_V1_00: LibraryDef = LibraryDef::new(
        "6a291e6040b90879575c89e914cf3518",
        Pro,
        "Tools",
        "V1_00",
        &[
            ("AddPos", 21),
            ("ArrayBank", 23),
            ("ArrayDim", 16),
            ("ArrayGet", 18),
            ("ArraySet", 17),
            ("Decode", 44),
            ("Encode", 42),
            ("GetByte", 9),
            ("GetCrypt", 37),
            ("GetLong", 12),
            ("GetPos", 4),
            ("GetString", 14),
            ("GetWord", 10),
            ("OuiBank", 26),
            ("OuiData", 27),
            ("OuiEdata", 29),
            ("OuiInit", 40),
            ("OuiNew", 39),
            ("OuiReserveText", 31),
            ("OuiSetBank", 25),
            ("OuiSetData", 28),
            ("OuiSetEdata", 30),
            ("OuiSetText", 32),
            ("OuiText", 33),
            ("Range", 20),
            ("SetArrayBank", 22),
            ("SetByte", 5),
            ("SetCrypt", 35),
            ("SetLong", 7),
            ("SetPos", 3),
            ("SetString", 8),
            ("SetWord", 6),
        ],
    );

    pub const TOOLS_V1_01: LibraryDef = LibraryDef::new(
        "bdba5e528c59c7300e517d966ff4889b",
        Pro,
        "Tools",
        "V1_01",
        &[("Checksum", 46)],
    )
    .extending(&TOOLS_V1_00);

    pub const AMON_V1_03: LibraryDef = LibraryDef::new(
        "520ca2adccb70f14b35233ed3222b360",
        Pro,
        "Amon",
        "V1_03",
        &[
            ("FastAngle_IIIII", 8),
            ("FastAngle_III", 9),
            ("FastCircle", 23),
            ("FastJoy0", 12),
            ("FastJoy1", 11),
            ("FastPlot", 21),
            ("Keycode", 14),
            ("KeyPress", 15),
            ("LimitRodent", 5),
            ("Lrodent", 6),
            ("MulCos", 17),
            ("MulSin", 16),
            ("RodentKey", 18),
            ("RodentX", 2),
            ("RodentY", 3),
            ("Rrodent", 7),
            ("SetRodent", 19),
            ("TestAdd", 22),
            ("VideoWait", 4),
        ],
    );

    pub const AMON_V1_04: LibraryDef = LibraryDef::new(
        "dfa5be99bec25c2e67fdce586b04f47f",
        Pro,
        "Amon",
        "V1_04",
        &[
            ("ArrayPlot", 24),
            ("CountColour", 20),
            ("FastPoint", 22),
            ("FindColour", 29),
            ("Joy3", 25),
            ("Joy4", 26),
        ],
    )
    .extending(&AMON_V1_03);

    pub const SERIAL_V1_10: LibraryDef = LibraryDef::new(
        "ca910488e6880d63791ba3fda1858d54",
        Creator,
        "Serial",
        "V1_10",
        &[
            ("SerialOpen_II", 3),
            ("SerialOpen_IIIII", 4),
            ("SerialClose", 6),
            ("SerialClose_I", 5),
            ("SerialSpeed", 12),
            ("SerialCheck", 20),
            ("SerialSend", 8),
            ("SerialBits", 14),
            ("SerialX", 16),
            ("SerialBuf", 17),
            ("SerialParity", 15),
            ("SerialGet", 10),
            ("SerialInput", 11),
            ("SerialFast", 18),
            ("SerialSlow", 19),
            ("SerialError", 21),
            ("SerialOut", 9),
        ],
    );

    pub const SERIAL_V1_20: LibraryDef =
        LibraryDef::new("3473e258886a7f864a78c971995668dd", Creator, "Serial", "V1_20", &[])
            .extending(&SERIAL_V1_10);

    pub const AGA_PRO_V1_00: LibraryDef = LibraryDef::new(
        "0b00fbcde204d2b6b3597d97d30c8b95",
        Pro,
        "AGA",
        "ProV1_00",
        &[
            ("AgaBar", 7),
            ("AgaBox", 6),
            ("AgaClip", 39),
            ("AgaCls", 12),
            ("AgaCls_I", 13),
            ("AgaColour_IIII__V", 24),
            ("AgaColour_I__I", 25),
            ("AgaDelBlock", 42),
            ("AgaDrawMode", 35),
            ("AgaFrontScreen", 30),
            ("AgaGetBankPalette", 38),
            ("AgaGetBlock_IIIII", 18),
            ("AgaGetBlock_IIIIII", 19),
            ("AgaGetPalette", 5),
            ("AgaInk_I", 9),
            ("AgaInk_II", 10),
            ("AgaLoadBitplanes", 29),
            ("AgaPoint", 55),
            ("AgaPutBlock", 20),
            ("AgaScreen", 23),
            ("AgaScreenClose", 22),
            ("AgaScreenCopy_II", 3),
            ("AgaScreenCopy_IIIIIIII", 4),
            ("AgaScreenOpen", 2),
            ("AgaSpack", 47),
            ("AgaSpriteMode", 36),
            ("AgaText", 8),
            ("AgaUnpack", 48),
            ("AgaUseFont", 54),
        ],
    );

    pub const COLOURS_V1_00: LibraryDef = LibraryDef::new(
        "abdae43fb9bcc08a20588f1e588ba5fa",
        Pro,
        "Colours",
        "V1_00",
        &[
            ("Black", 5),
            ("Blue", 4),
            ("Brown", 11),
            ("COrange", 12),
            ("Cyan", 8),
            ("DarkBlue", 15),
            ("DarkBrown", 20),
            ("DarkCyan", 18),
            ("DarkGreen", 14),
            ("DarkGrey", 19),
            ("DarkMagenta", 17),
            ("DarkRed", 13),
            ("DarkYellow", 16),
            ("Green", 3),
            ("Grey", 10),
            ("LightBlue", 23),
            ("LightBrown", 28),
            ("LightCyan", 26),
            ("LightGreen", 22),
            ("LightGrey", 27),
            ("LightMagenta", 25),
            ("LightRed", 21),
            ("LightYellow", 24),
            ("Magenta", 7),
            ("Red", 2),
            ("White", 9),
            ("Yellow", 6),
        ],
    );

    pub const COOLSTARS_V1_00: LibraryDef = LibraryDef::new(
        "3f396c63b5930eb678c608016f85bf58",
        Pro,
        "CoolStars",
        "V1_00",
        &[
            ("CstarsBclear", 45),
            ("CstarsBdraw", 46),
            ("CstarsBdraw_I", 47),
            ("CstarsBdraw_II", 48),
            ("CstarsCalc", 49),
            ("CstarsCalc_I", 50),
            ("CstarsCalc_II", 51),
            ("CstarsClear", 41),
            ("CstarsColour", 40),
            ("CstarsDraw", 42),
            ("CstarsDraw_I", 43),
            ("CstarsDraw_II", 44),
            ("CstarsLimit", 30),
            ("CstarsLimit_IIII", 31),
            ("CstarsMakeOrigins", 32),
            ("CstarsOriginOff", 33),
            ("CstarsReserve", 16),
            ("CstarsReserve_II", 17),
            ("CstarsSet_III", 18),
            ("CstarsSet_IIIII", 19),
            ("CstarsSet_IIIIII", 20),
            ("CstarsSetColour", 23),
            ("CstarsSetXSpd", 21),
            ("CstarsSetYSpd", 22),
            ("CstarsXDir", 38),
            ("CstarsXRev", 24),
            ("CstarsXRev_I", 25),
            ("CstarsXRev_II", 26),
            ("CstarsXSpd", 36),
            ("CstarsXStar", 34),
            ("CstarsYDir", 39),
            ("CstarsYRev", 27),
            ("CstarsYRev_I", 28),
            ("CstarsYRev_II", 29),
            ("CstarsYSpd", 37),
            ("CstarsYStar", 35),
        ],
    );

    pub const DBENCH_V0_42: LibraryDef = LibraryDef::new(
        "5c4763ee21d35b109e4f272a9628ff04",
        Pro,
        "DBench",
        "V0_42",
        &[
            ("DbAddress", 4),
            ("DbClose", 7),
            ("DbField_I__S", 23),
            ("DbField_S__I", 24),
            ("DbFieldno", 10),
            ("DbFlen", 8),
            ("DbFtype", 14),
            ("DbGet", 25),
            ("DbGoto", 26),
            ("DbOpencount", 16),
            ("DbPut", 27),
            ("DbReccount", 20),
            ("DbRecle", 22),
            ("DbRecno", 21),
            ("DbRecsaved", 13),
            ("DbSavedOff", 12),
            ("DbSavedOn", 11),
            ("DbSel", 5),
            ("DbSelect", 15),
            ("DbSelectFirst", 18),
            ("DbSelectNext", 17),
            ("DbState", 19),
            ("DbUse", 6),
        ],
    );

    pub const THX_V0_6: LibraryDef = LibraryDef::new(
        "dc22ca6e0e626e06a7044963d6a7fa6c",
        Pro,
        "THX",
        "V0_6",
        &[
            ("ThxEnd", 7),
            ("ThxLoad", 4),
            ("ThxPlay", 2),
            ("ThxStop", 3),
            ("ThxSubsongs", 6),
            ("ThxVolume", 5),
        ],
    );

    pub const EFFECTS_V0_15: LibraryDef = LibraryDef::new(
        "896cfbace7e6e3aacc711e49dd260ce1",
        Pro,
        "Effects",
        "V0_15",
        &[
            ("AgaFadeCmap_I", 8),
            ("AgaFadeCmap_II", 9),
            ("BankInterpolateB", 11),
            ("BankInterpolateL", 13),
            ("BankInterpolateW", 12),
            ("CreateScreenTable", 2),
            ("StarclearOne", 5),
            ("StarclearTwo", 7),
            ("StarfieldBank", 3),
            ("StarfieldOne", 4),
            ("StarfieldTwo", 6),
            ("WriteAgaCmap", 10),
        ],
    );

    pub const ERCOLE_V1_70: LibraryDef = LibraryDef::new(
        "598f3c52426d00c38399303cfab5c717",
        Pro,
        "Ercole",
        "V1_70",
        &[
            ("Cli", 3),
            ("ExtFire", 9),
            ("ExtJoy", 8),
            ("LibraryClose", 5),
            ("LibraryOpen", 4),
            ("Paddle", 6),
            ("PadFire", 7),
            ("PropOff", 2),
            ("PropOn", 1),
            ("Xfire", 10),
            ("Yfire", 11),
        ],
    );

    pub const FIRST_V0_10: LibraryDef = LibraryDef::new(
        "5ab1de0fd129b344505f134651a2c3ab",
        Pro,
        "First",
        "V0_10",
        &[
            ("ChangeLed", 3),
            ("ClearBanks", 6),
            ("WaitJoy", 5),
            ("WaitMouse", 4),
        ],
    );

    pub const JOTRE_V1_00: LibraryDef = LibraryDef::new(
        "0128bd165441e7dc3476b33aab15ac2f",
        Pro,
        "Jotre",
        "V1_00",
        &[
            ("DeinitThx", 5),
            ("InitThx", 4),
            ("PlayThx", 6),
            ("StopThx", 7),
            ("VolumeThx", 8),
        ],
    );

    pub const JOTRE_V1_00_ALT: LibraryDef =
        LibraryDef::new("458bf8c621cd53d696a913e3a3e1bd3b", Pro, "Jotre", "V1_00_ALT", &[])
            .extending(&JOTRE_V1_00);

    pub const JVP_V1_01: LibraryDef = LibraryDef::new(
        "7b0f1233dbf051041d8aa9ec256980a5",
        Pro,
        "JVP",
        "V1_01",
        &[
            ("JvpBinSort", 2),
            ("JvpBinSortType", 12),
            ("JvpCstr", 8),
            ("JvpMsg", 15),
            ("JvpMsg_III", 16),
            ("JvpMsgBank", 17),
            ("JvpMsgExists", 14),
            ("JvpSetMsgBank", 13),
            ("JvpSetStrLen", 3),
            ("JvpSetStrSep", 4),
            ("JvpSetStrSep_I", 5),
            ("JvpSetStrSep_IIIIII", 6),
            ("JvpStr", 7),
            ("JvpVersion", 11),
        ],
    );

    pub const LOCALE_V0_26: LibraryDef = LibraryDef::new(
        "1533b53d6fe0018d4a334934c2177609",
        Pro,
        "Locale",
        "V0_26",
        &[
            ("CatalogActive", 13),
            ("CatalogString", 7),
            ("CloseCatalog", 11),
            ("Date", 21),
            ("Datetime", 23),
            ("EmitCatalogDescription", 14),
            ("EmitClose", 15),
            ("FormatDate", 20),
            ("LocaleActive", 12),
            ("LocaleCompare_SS", 17),
            ("LocaleCompare_SSI", 18),
            ("LocaleLower", 2),
            ("LocaleString", 6),
            ("LocaleUpper", 3),
            ("Lowerchar", 4),
            ("OpenCatalog_SS", 9),
            ("OpenCatalog_SSI", 8),
            ("ShortDate", 24),
            ("ShortDatetime", 26),
            ("ShortTime", 25),
            ("Time", 22),
            ("Upperchar", 5),
        ],
    );

    pub const LSERIAL_V1_00: LibraryDef = LibraryDef::new(
        "cd9a014db36652889319c3599568dedc",
        Pro,
        "Lserial",
        "V1_00",
        &[
            ("Lcarrier", 10),
            ("Linkey", 14),
            ("LserBaud", 12),
            ("LserBrk", 11),
            ("LserClose", 2),
            ("LserGet", 9),
            ("LserMulCheck", 8),
            ("LserMulSend", 7),
            ("LserOpen", 1),
            ("LserParams", 15),
            ("LserQuery", 6),
            ("LserRead", 4),
            ("LserSend", 3),
            ("LserStatus", 16),
            ("Lxpr", 13),
        ],
    );

    pub const LSERIAL_V1_00_ALT: LibraryDef =
        LibraryDef::new("7abb0e24b19ecc37375a92a1bcfcc0fb", Pro, "Lserial", "V1_00_ALT", &[])
            .extending(&LSERIAL_V1_00);

    pub const MISC_V1_00: LibraryDef = LibraryDef::new(
        "705ae209c25563aa86997a3ee6bfe915",
        Pro,
        "Misc",
        "V1_00",
        &[
            ("ClearRam", 11),
            ("DiskWait", 13),
            ("DisplayOff", 3),
            ("DisplayOn", 4),
            ("DledOff", 8),
            ("DledOn", 7),
            ("Firewait", 12),
            ("MouseOff", 9),
            ("MultiOff", 5),
            ("MultiOn", 6),
            ("PalOn", 14),
            ("Reset", 10),
        ],
    );

    pub const P61_V1_10: LibraryDef = LibraryDef::new(
        "bd2ef5bbd17bc80a0ed29573c6b0d1c5",
        Pro,
        "P61",
        "V1_10",
        &[
            ("P61CiaSpeed", 8),
            ("P61Continue", 6),
            ("P61Fade_I", 10),
            ("P61Fade_II", 11),
            ("P61Pause", 5),
            ("P61Play_I", 2),
            ("P61Play_II", 3),
            ("P61Pos", 12),
            ("P61Signal", 9),
            ("P61Stop", 4),
            ("P61Volume", 7),
        ],
    );

    pub const P61_V1_20: LibraryDef =
        LibraryDef::new("6e97e9396e27a2716e1e05fecd235beb", Pro, "P61", "V1_20", &[])
            .extending(&P61_V1_10);

    pub const TFT_V0_6: LibraryDef = LibraryDef::new(
        "1e0403b9b3e49b03d9d2ca7d7a6f7a67",
        Pro,
        "TFT",
        "V0_6",
        &[
            ("CpuClear", 26),
            ("CpuClearNtsc", 24),
            ("CpuClearPal", 25),
            ("GetHighWord", 6),
            ("GetLowWord", 7),
            ("GetTimer", 9),
            ("GetXmouse", 17),
            ("GetYmouse", 18),
            ("InitBplScroll", 8),
            ("InitCpuClear", 27),
            ("InitTimer", 12),
            ("MfmLuecke", 4),
            ("MfmRead", 3),
            ("Qsort_III", 20),
            ("Qsort_IIII", 21),
            ("SetBpl", 5),
            ("StartInt", 11),
            ("StartTimer", 13),
            ("StopInt", 10),
            ("StopTimer", 14),
            ("TftError", 19),
            ("TftVersion", 23),
            ("VarMask", 22),
        ],
    );

    // EME patches the Music extension; the Music tables are not carried, so
    // only EME's own routines resolve.
    pub const EME_V3_00_DEMO: LibraryDef = LibraryDef {
        same: &[("TrackSampleOff", "TrackSampleOn")],
        ..LibraryDef::new(
            "956464c43f7d3a0f1b9031db2382c44c",
            Creator,
            "EME",
            "V3_00DEMO",
            &[
                ("MedCont", 111),
                ("MedLoad", 101),
                ("MedMidiOn", 108),
                ("MedPlay", 104),
                ("MedPlay_II", 106),
                ("MedPlay_I", 105),
                ("MedStop", 103),
                ("MedTempo", 112),
                ("PattLoopNo", 116),
                ("PattLoopOf", 114),
                ("PattLoopOn", 113),
                ("TrCredits", 119),
                ("TrackSampleOff", 117),
                ("TrackSampleOn", 118),
                ("TrackTempo", 97),
                ("Trlen", 99),
                ("Trpat", 100),
                ("Trpos", 98),
                ("Trstat", 115),
            ],
        )
    };

    pub const EME_PRO_V3_00_DEMO: LibraryDef = LibraryDef {
        same: &[("TrackSampleOff", "TrackSampleOn")],
        ..LibraryDef::new(
            "b448154293965887ab6e116e091b12b3",
            Pro,
            "EME",
            "V3_00DEMO",
            &[
                ("PattLoopNo", 120),
                ("PattLoopOf", 114),
                ("PattLoopOn", 113),
                ("TrackSampleOff", 121),
                ("TrackSampleOn", 122),
                ("TrackTempo", 116),
                ("Trlen", 118),
                ("Trpat", 119),
                ("Trpos", 117),
                ("Trstat", 115),
            ],
        )
    };
}

/// Every built-in definition.
pub const BUILTIN: &[LibraryDef] = &[
    known::MAKE_V1_20,
    known::MAKE_V1_30,
    known::COMPACT_PRO_V2_00,
    known::REQUESTER_PRO_V2_00,
    known::TOOLS_V1_00,
    known::TOOLS_V1_01,
    known::AMON_V1_03,
    known::AMON_V1_04,
    known::SERIAL_V1_10,
    known::SERIAL_V1_20,
    known::AGA_PRO_V1_00,
    known::COLOURS_V1_00,
    known::COOLSTARS_V1_00,
    known::DBENCH_V0_42,
    known::THX_V0_6,
    known::EFFECTS_V0_15,
    known::ERCOLE_V1_70,
    known::FIRST_V0_10,
    known::JOTRE_V1_00,
    known::JOTRE_V1_00_ALT,
    known::JVP_V1_01,
    known::LOCALE_V0_26,
    known::LSERIAL_V1_00,
    known::LSERIAL_V1_00_ALT,
    known::MISC_V1_00,
    known::P61_V1_10,
    known::P61_V1_20,
    known::TFT_V0_6,
    known::EME_V3_00_DEMO,
    known::EME_PRO_V3_00_DEMO,
];
