//! Game mode and mission identifiers carried in query responses.
//!
//! Both values travel as a single byte.  The mode says which edition of the
//! game the server is running (shareware, registered, ...) and the mission
//! says which IWAD family.  Together they produce the short tag shown in the
//! server list, e.g. `ultdoom` or `plutonia`.

use serde::{Deserialize, Serialize};

/// Edition of the game the server is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum GameMode {
    Shareware = 0,
    Registered = 1,
    Commercial = 2,
    Retail = 3,
    /// The server could not determine its mode.  No description is shown.
    Indetermined = 4,
}

impl TryFrom<u8> for GameMode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(GameMode::Shareware),
            1 => Ok(GameMode::Registered),
            2 => Ok(GameMode::Commercial),
            3 => Ok(GameMode::Retail),
            4 => Ok(GameMode::Indetermined),
            _ => Err(()),
        }
    }
}

/// IWAD family the server is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum GameMission {
    Doom = 0,
    Doom2 = 1,
    PackTnt = 2,
    PackPlut = 3,
    PackChex = 4,
    PackHacx = 5,
    Heretic = 6,
    Hexen = 7,
    Strife = 8,
    None = 9,
}

impl TryFrom<u8> for GameMission {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(GameMission::Doom),
            1 => Ok(GameMission::Doom2),
            2 => Ok(GameMission::PackTnt),
            3 => Ok(GameMission::PackPlut),
            4 => Ok(GameMission::PackChex),
            5 => Ok(GameMission::PackHacx),
            6 => Ok(GameMission::Heretic),
            7 => Ok(GameMission::Hexen),
            8 => Ok(GameMission::Strife),
            9 => Ok(GameMission::None),
            _ => Err(()),
        }
    }
}

/// Returns the short tag used in server listings for a mode/mission pair.
///
/// The original Doom mission is split by edition; every other mission has a
/// single tag regardless of mode.
///
/// # Examples
///
/// ```rust
/// use netquery_core::{game_description, GameMission, GameMode};
///
/// assert_eq!(game_description(GameMode::Retail, GameMission::Doom), "ultdoom");
/// assert_eq!(game_description(GameMode::Commercial, GameMission::PackPlut), "plutonia");
/// ```
pub fn game_description(mode: GameMode, mission: GameMission) -> &'static str {
    match mission {
        GameMission::Doom => match mode {
            GameMode::Shareware => "swdoom",
            GameMode::Registered => "regdoom",
            GameMode::Retail => "ultdoom",
            _ => "doom",
        },
        GameMission::Doom2 => "doom2",
        GameMission::PackTnt => "tnt",
        GameMission::PackPlut => "plutonia",
        GameMission::PackChex => "chex",
        GameMission::PackHacx => "hacx",
        GameMission::Heretic => "heretic",
        GameMission::Hexen => "hexen",
        GameMission::Strife => "strife",
        GameMission::None => "?",
    }
}
