#![forbid(unsafe_code)]

pub mod error;
pub mod fx;
pub mod hash;
pub mod ident;
pub mod mapping;
pub mod model;
pub mod pack;
pub mod svg;
pub mod xml;

pub use error::{WxError, WxResult};
pub use fx::{FxEntry, FxKey, FxTable, default_fx};
pub use mapping::{MappedSpec, SvgMapOptions, map_svg_to_spec};
pub use model::{Asset, AssetType, Components, Layer, Metadata, SPEC_VERSION, Spec};
pub use pack::{build_pack, extract_spec_json, verify_pack_crc};
