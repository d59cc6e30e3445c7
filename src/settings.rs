//! The event display's user settings.
//!
//! [`display_settings`] builds the registry every part of the application
//! reads its configuration from. Keys are stable: they are the storage keys,
//! so renaming one orphans every value users have already saved.

use crate::storage::Storage;
use crate::{Error, Property, Registry};

pub const GEOMETRY_URL: &str = "geometry.selectedGeometry";
pub const GEOMETRY_FAST_AND_UGLY: &str = "geometry.FastDefaultMaterial";
pub const GEOMETRY_CUT_LIST: &str = "geometry.cutListName";
pub const GEOMETRY_THEME: &str = "geometry.themeName";
pub const GEOMETRY_ROOT_FILTER: &str = "geometry.rootFilterName";
pub const DEX_EVENT_SOURCE: &str = "events.dexEventsSource";
pub const ROOT_EVENT_SOURCE: &str = "events.rootEventSource";
pub const ROOT_EVENT_RANGE: &str = "events.rootEventRange";
pub const SERVER_USE_API: &str = "server.useApi";
pub const SERVER_URL: &str = "server.url";
pub const CLIPPING_ENABLED: &str = "geometry.clippingEnabled";
pub const CLIPPING_START_ANGLE: &str = "geometry.clippingStartAngle";
pub const CLIPPING_OPENING_ANGLE: &str = "clipping.openingAngle";
pub const UI_THEME: &str = "ui.theme";

pub const DEFAULT_GEOMETRY_URL: &str = "https://eic.github.io/epic/artifacts/tgeo/epic_craterlake.root";
pub const DEFAULT_SERVER_URL: &str = "http://localhost:5454";

/// The themes the UI understands.
pub const UI_THEMES: [&str; 3] = ["dark", "light", "system"];

/// Whether `angle` is a valid clipping angle, in degrees.
pub fn is_angle(angle: &f64) -> bool {
    (0.0..=360.0).contains(angle)
}

/// Whether `theme` names a UI theme.
pub fn is_ui_theme(theme: &str) -> bool {
    UI_THEMES.iter().any(|known| *known == theme)
}

/// Build the registry of display settings over `storage`.
///
/// ##### Example
///
/// ```
/// use lwwconfig::settings::{self, CLIPPING_START_ANGLE, UI_THEME};
/// use lwwconfig::storage::MemoryStorage;
///
/// let mut settings = settings::display_settings(MemoryStorage::new()).unwrap();
/// assert_eq!("system", settings.get::<String>(UI_THEME).unwrap().value());
///
/// let angle = settings.require::<f64>(CLIPPING_START_ANGLE).unwrap();
/// assert!(angle.set(400.0).is_err());
/// assert_eq!(90.0, *angle.value());
/// ```
pub fn display_settings<S>(storage: S) -> Result<Registry, Error> where S: Storage + 'static {
    let mut registry = Registry::new(storage);
    let storage = registry.storage();

    registry.create(GEOMETRY_URL, DEFAULT_GEOMETRY_URL.to_string())?;
    registry.create(GEOMETRY_FAST_AND_UGLY, false)?;
    registry.create(GEOMETRY_CUT_LIST, "central".to_string())?;
    registry.create(GEOMETRY_THEME, "cool2".to_string())?;
    registry.create(GEOMETRY_ROOT_FILTER, "default".to_string())?;
    registry.create(DEX_EVENT_SOURCE, String::new())?;
    registry.create(ROOT_EVENT_SOURCE, String::new())?;
    registry.create(ROOT_EVENT_RANGE, "0-5".to_string())?;
    registry.create(SERVER_USE_API, false)?;
    registry.create(SERVER_URL, DEFAULT_SERVER_URL.to_string())?;
    registry.create(CLIPPING_ENABLED, true)?;

    registry.insert(Property::builder(UI_THEME, "system".to_string())
        .validator(|theme: &String| is_ui_theme(theme))
        .storage(storage.clone())
        .build())?;
    registry.insert(Property::builder(CLIPPING_START_ANGLE, 90.0)
        .validator(is_angle)
        .storage(storage.clone())
        .build())?;
    registry.insert(Property::builder(CLIPPING_OPENING_ANGLE, 180.0)
        .validator(is_angle)
        .storage(storage)
        .build())?;

    Ok(registry)
}
