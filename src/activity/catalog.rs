//! Classification catalog: the static event table and its lookup indices.
//!
//! Every classification event is plain data. [`Catalog`] derives the region,
//! skill and varbit indices once and answers lookups from host signals.

#![allow(missing_docs)]

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::core::errors::{ItelError, Result};

/// Raid-in-progress flag for Chambers of Xeric.
pub const VARBIT_IN_RAID: u32 = 5432;
/// Raid-in-progress flag for Theatre of Blood.
pub const VARBIT_THEATRE_OF_BLOOD: u32 = 6440;

/// Id of the "no active context" baseline.
pub const IDLE_ROOT: &str = "IN_MENU";
pub const IN_GAME: &str = "IN_GAME";
pub const IN_MENU: &str = "IN_MENU";
pub const WILDERNESS: &str = "WILDERNESS";
pub const PLAYING_DEADMAN: &str = "PLAYING_DEADMAN";
pub const PLAYING_PVP: &str = "PLAYING_PVP";
pub const MG_NIGHTMARE_ZONE: &str = "MG_NIGHTMARE_ZONE";
pub const BOSS_KING_BLACK_DRAGON: &str = "BOSS_KING_BLACK_DRAGON";
pub const MG_LAST_MAN_STANDING: &str = "MG_LAST_MAN_STANDING";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Skill {
    Attack,
    Defence,
    Strength,
    Hitpoints,
    Ranged,
    Prayer,
    Magic,
    Cooking,
    Woodcutting,
    Fletching,
    Fishing,
    Firemaking,
    Crafting,
    Smithing,
    Mining,
    Herblore,
    Agility,
    Thieving,
    Slayer,
    Farming,
    Runecraft,
    Hunter,
    Construction,
    Overall,
}

impl Skill {
    /// Upper-case identifier used in tags (`ATTACK`).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Attack => "ATTACK",
            Self::Defence => "DEFENCE",
            Self::Strength => "STRENGTH",
            Self::Hitpoints => "HITPOINTS",
            Self::Ranged => "RANGED",
            Self::Prayer => "PRAYER",
            Self::Magic => "MAGIC",
            Self::Cooking => "COOKING",
            Self::Woodcutting => "WOODCUTTING",
            Self::Fletching => "FLETCHING",
            Self::Fishing => "FISHING",
            Self::Firemaking => "FIREMAKING",
            Self::Crafting => "CRAFTING",
            Self::Smithing => "SMITHING",
            Self::Mining => "MINING",
            Self::Herblore => "HERBLORE",
            Self::Agility => "AGILITY",
            Self::Thieving => "THIEVING",
            Self::Slayer => "SLAYER",
            Self::Farming => "FARMING",
            Self::Runecraft => "RUNECRAFT",
            Self::Hunter => "HUNTER",
            Self::Construction => "CONSTRUCTION",
            Self::Overall => "OVERALL",
        }
    }

    /// Display label used in the activity state (`Attack`).
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Attack => "Attack",
            Self::Defence => "Defence",
            Self::Strength => "Strength",
            Self::Hitpoints => "Hitpoints",
            Self::Ranged => "Ranged",
            Self::Prayer => "Prayer",
            Self::Magic => "Magic",
            Self::Cooking => "Cooking",
            Self::Woodcutting => "Woodcutting",
            Self::Fletching => "Fletching",
            Self::Fishing => "Fishing",
            Self::Firemaking => "Firemaking",
            Self::Crafting => "Crafting",
            Self::Smithing => "Smithing",
            Self::Mining => "Mining",
            Self::Herblore => "Herblore",
            Self::Agility => "Agility",
            Self::Thieving => "Thieving",
            Self::Slayer => "Slayer",
            Self::Farming => "Farming",
            Self::Runecraft => "Runecraft",
            Self::Hunter => "Hunter",
            Self::Construction => "Construction",
            Self::Overall => "Overall",
        }
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationType {
    Bosses,
    Cities,
    Dungeons,
    Minigames,
    Raids,
    Poi,
}

impl LocationType {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bosses => "BOSSES",
            Self::Cities => "CITIES",
            Self::Dungeons => "DUNGEONS",
            Self::Minigames => "MINIGAMES",
            Self::Raids => "RAIDS",
            Self::Poi => "POI",
        }
    }
}

/// One classification event and its behavior flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventDef {
    pub id: &'static str,
    pub location: Option<&'static str>,
    pub skill: Option<Skill>,
    pub location_type: Option<LocationType>,
    /// Higher wins during resolution.
    pub priority: i32,
    /// Triggering removes every other active clearing event.
    pub clears: bool,
    /// Removed by the heartbeat once idle past the timeout.
    pub times_out: bool,
    pub varbit: Option<u32>,
    pub regions: &'static [u32],
}

impl EventDef {
    /// Game-state context (in game, in menu, world kind).
    #[must_use]
    pub const fn state(id: &'static str, label: &'static str, priority: i32) -> Self {
        Self {
            id,
            location: Some(label),
            skill: None,
            location_type: None,
            priority,
            clears: true,
            times_out: false,
            varbit: None,
            regions: &[],
        }
    }

    /// Skill being trained; expires when idle.
    #[must_use]
    pub const fn skill(id: &'static str, skill: Skill, priority: i32) -> Self {
        Self {
            id,
            location: None,
            skill: Some(skill),
            location_type: None,
            priority,
            clears: false,
            times_out: true,
            varbit: None,
            regions: &[],
        }
    }

    /// Named area identified by world region ids.
    #[must_use]
    pub const fn area(
        id: &'static str,
        label: &'static str,
        location_type: LocationType,
        regions: &'static [u32],
    ) -> Self {
        Self {
            id,
            location: Some(label),
            skill: None,
            location_type: Some(location_type),
            priority: -2,
            clears: true,
            times_out: false,
            varbit: None,
            regions,
        }
    }

    /// Named area identified by a non-zero varbit.
    #[must_use]
    pub const fn varbit(
        id: &'static str,
        label: &'static str,
        location_type: LocationType,
        varbit: u32,
    ) -> Self {
        Self {
            varbit: Some(varbit),
            ..Self::area(id, label, location_type, &[])
        }
    }

    /// Builder-style override of the behavior flags, for custom catalogs.
    #[must_use]
    pub const fn with_flags(mut self, priority: i32, clears: bool, times_out: bool) -> Self {
        self.priority = priority;
        self.clears = clears;
        self.times_out = times_out;
        self
    }
}

/// The built-in event table.
pub static GAME_EVENTS: &[EventDef] = &[
    EventDef::state("IN_GAME", "In Game", -3),
    EventDef::state("IN_MENU", "In Menu", -3),
    EventDef::state("PLAYING_DEADMAN", "Playing Deadman Mode", -3),
    EventDef::state("PLAYING_PVP", "Playing in a PVP world", -3),
    EventDef::state("WILDERNESS", "Wilderness", -2),
    EventDef::skill("TRAINING_ATTACK", Skill::Attack, 0),
    EventDef::skill("TRAINING_DEFENCE", Skill::Defence, 0),
    EventDef::skill("TRAINING_STRENGTH", Skill::Strength, 0),
    EventDef::skill("TRAINING_HITPOINTS", Skill::Hitpoints, -1),
    EventDef::skill("TRAINING_SLAYER", Skill::Slayer, 1),
    EventDef::skill("TRAINING_RANGED", Skill::Ranged, 0),
    EventDef::skill("TRAINING_MAGIC", Skill::Magic, 0),
    EventDef::skill("TRAINING_PRAYER", Skill::Prayer, 0),
    EventDef::skill("TRAINING_COOKING", Skill::Cooking, 0),
    EventDef::skill("TRAINING_WOODCUTTING", Skill::Woodcutting, 0),
    EventDef::skill("TRAINING_FLETCHING", Skill::Fletching, 0),
    EventDef::skill("TRAINING_FISHING", Skill::Fishing, 1),
    EventDef::skill("TRAINING_FIREMAKING", Skill::Firemaking, 0),
    EventDef::skill("TRAINING_CRAFTING", Skill::Crafting, 0),
    EventDef::skill("TRAINING_SMITHING", Skill::Smithing, 0),
    EventDef::skill("TRAINING_MINING", Skill::Mining, 0),
    EventDef::skill("TRAINING_HERBLORE", Skill::Herblore, 0),
    EventDef::skill("TRAINING_AGILITY", Skill::Agility, 0),
    EventDef::skill("TRAINING_THIEVING", Skill::Thieving, 0),
    EventDef::skill("TRAINING_FARMING", Skill::Farming, 0),
    EventDef::skill("TRAINING_RUNECRAFT", Skill::Runecraft, 0),
    EventDef::skill("TRAINING_HUNTER", Skill::Hunter, 0),
    EventDef::skill("TRAINING_CONSTRUCTION", Skill::Construction, 0),
    // bosses
    EventDef::area(
        "BOSS_ABYSSAL_SIRE",
        "Abyssal Sire",
        LocationType::Bosses,
        &[11851, 11850, 12363, 12362],
    ),
    EventDef::area("BOSS_CERBERUS", "Cerberus", LocationType::Bosses, &[4883, 5140, 5395]),
    EventDef::area("BOSS_COMMANDER_ZILYANA", "Commander Zilyana", LocationType::Bosses, &[11602]),
    EventDef::area("BOSS_DKS", "Dagannoth Kings", LocationType::Bosses, &[11588, 11589]),
    EventDef::area("BOSS_GENERAL_GRAARDOR", "General Graardor", LocationType::Bosses, &[11347]),
    EventDef::area("BOSS_GIANT_MOLE", "Giant Mole", LocationType::Bosses, &[6993, 6992]),
    EventDef::area(
        "BOSS_GROTESQUE_GUARDIANS",
        "Grotesque Guardians",
        LocationType::Bosses,
        &[6727],
    ),
    EventDef::area("BOSS_HYDRA", "Alchemical Hydra", LocationType::Bosses, &[5536]),
    EventDef::area("BOSS_KING_BLACK_DRAGON", "King Black Dragon", LocationType::Bosses, &[]),
    EventDef::area("BOSS_KQ", "Kalphite Queen", LocationType::Bosses, &[13972]),
    EventDef::area("BOSS_KRAKEN", "Kraken", LocationType::Bosses, &[9116]),
    EventDef::area("BOSS_KREEARRA", "Kree'arra", LocationType::Bosses, &[11346]),
    EventDef::area("BOSS_KRIL_TSUTSAROTH", "K'ril Tsutsaroth", LocationType::Bosses, &[11603]),
    EventDef::area("BOSS_SKOTIZO", "Skotizo", LocationType::Bosses, &[6810]),
    EventDef::area(
        "BOSS_SMOKE_DEVIL",
        "Thermonuclear smoke devil",
        LocationType::Bosses,
        &[9363, 9619],
    ),
    EventDef::area("BOSS_VORKATH", "Vorkath", LocationType::Bosses, &[9023]),
    EventDef::area("BOSS_WINTERTODT", "Wintertodt", LocationType::Bosses, &[6462]),
    EventDef::area("BOSS_ZALCANO", "Zalcano", LocationType::Bosses, &[13250]),
    EventDef::area("BOSS_ZULRAH", "Zulrah", LocationType::Bosses, &[9007, 9008]),
    EventDef::area("BOSS_NIGHTMARE", "Nightmare of Ashihama", LocationType::Bosses, &[15515]),
    // cities
    EventDef::area("CITY_AL_KHARID", "Al Kharid", LocationType::Cities, &[13105, 13106]),
    EventDef::area(
        "CITY_APE_ATOLL",
        "Ape Atoll",
        LocationType::Cities,
        &[10795, 11051, 10974, 11050],
    ),
    EventDef::area(
        "CITY_ARCEUUS_HOUSE",
        "Arceuus",
        LocationType::Cities,
        &[6459, 6715, 6458, 6714],
    ),
    EventDef::area(
        "CITY_ARDOUGNE",
        "Ardougne",
        LocationType::Cities,
        &[10548, 10547, 10292, 10291, 10036, 10035, 9780, 9779],
    ),
    EventDef::area("CITY_BARBARIAN_VILLAGE", "Barbarian Village", LocationType::Cities, &[12341]),
    EventDef::area("CITY_BANDIT_CAMP", "Bandit Camp", LocationType::Cities, &[12591]),
    EventDef::area("CITY_BEDABIN_CAMP", "Bedabin Camp", LocationType::Cities, &[12590]),
    EventDef::area("CITY_BRIMHAVEN", "Brimhaven", LocationType::Cities, &[11057, 11058]),
    EventDef::area(
        "CITY_BURGH_DE_ROTT",
        "Burgh de Rott",
        LocationType::Cities,
        &[13874, 13873, 14130, 14129],
    ),
    EventDef::area("CITY_BURTHORPE", "Burthorpe", LocationType::Cities, &[11319, 11575]),
    EventDef::area("CITY_CANIFIS", "Canifis", LocationType::Cities, &[13878]),
    EventDef::area("CITY_CATHERBY", "Catherby", LocationType::Cities, &[11317, 11318, 11061]),
    EventDef::area("CITY_CORSAIR_CAVE", "Corsair Cove", LocationType::Cities, &[10028, 10284]),
    EventDef::area("CITY_DARKMEYER", "Darkmeyer", LocationType::Cities, &[14388]),
    EventDef::area("CITY_DORGESH_KAAN", "Dorgesh-Kaan", LocationType::Cities, &[10835, 10834]),
    EventDef::area("CITY_DRAYNOR", "Draynor", LocationType::Cities, &[12338]),
    EventDef::area("CITY_EDGEVILLE", "Edgeville", LocationType::Cities, &[12342]),
    EventDef::area("CITY_ENTRANA", "Entrana", LocationType::Cities, &[11060, 11316]),
    EventDef::area(
        "CITY_FALADOR",
        "Falador",
        LocationType::Cities,
        &[11828, 11572, 11571, 11827, 12084],
    ),
    EventDef::area("CITY_GOBLIN_VILLAGE", "Goblin Village", LocationType::Cities, &[11830]),
    EventDef::area("CITY_GUTANOTH", "Gu'Tanoth", LocationType::Cities, &[10031]),
    EventDef::area("CITY_GWENITH", "Gwenith", LocationType::Cities, &[8501, 8757, 9013]),
    EventDef::area(
        "CITY_HOSIDIUS_HOUSE",
        "Hosidius",
        LocationType::Cities,
        &[6713, 6712, 6455, 6711, 6710, 6965, 6966, 7222, 7223, 6967],
    ),
    EventDef::area("CITY_JATISZO", "Jatizso", LocationType::Cities, &[9531]),
    EventDef::area("CITY_JIGGIG", "Jiggig", LocationType::Cities, &[9775]),
    EventDef::area(
        "CITY_KARAMJA",
        "Karamja",
        LocationType::Cities,
        &[11569, 11568, 11567, 11566, 11313, 11312, 11311],
    ),
    EventDef::area(
        "CITY_KELDAGRIM",
        "Keldagrim",
        LocationType::Cities,
        &[11423, 11422, 11679, 11678],
    ),
    EventDef::area("CITY_LLETYA", "Lletya", LocationType::Cities, &[9265]),
    EventDef::area(
        "CITY_LOVAKENGJ_HOUSE",
        "Lovakengj",
        LocationType::Cities,
        &[5692, 5948, 5691, 5947, 6203, 6202, 5690, 5946],
    ),
    EventDef::area("CITY_LUMBRIDGE", "Lumbridge", LocationType::Cities, &[12850]),
    EventDef::area(
        "CITY_LUNAR_ISLE",
        "Lunar Isle",
        LocationType::Cities,
        &[8253, 8252, 8509, 8508],
    ),
    EventDef::area(
        "CITY_MEIYERDITCH",
        "Meiyerditch",
        LocationType::Cities,
        &[14132, 14387, 14386, 14385],
    ),
    EventDef::area("CITY_MISCELLANIA", "Miscellania", LocationType::Cities, &[10044, 10300]),
    EventDef::area("CITY_MOS_LE_HARMLESS", "Mos Le'Harmless", LocationType::Cities, &[14638]),
    EventDef::area("CITY_MORTTON", "Mort'ton", LocationType::Cities, &[13875]),
    EventDef::area(
        "CITY_MOR_UI_REK",
        "Mor UI Rek",
        LocationType::Cities,
        &[9808, 9807, 10064, 10063],
    ),
    EventDef::area(
        "CITY_MOUNT_KARUULM",
        "Mount Karuulm",
        LocationType::Cities,
        &[5179, 4923, 5180],
    ),
    EventDef::area("CITY_MOUNT_QUIDAMORTEM", "Mount Quidamortem", LocationType::Cities, &[4919]),
    EventDef::area("CITY_NARDAH", "Nardah", LocationType::Cities, &[13613]),
    EventDef::area("CITY_NEITIZNOT", "Neitiznot", LocationType::Cities, &[9275]),
    EventDef::area("CITY_PISCATORIS", "Piscatoris", LocationType::Cities, &[9273]),
    EventDef::area("CITY_POLLNIVNEACH", "Pollnivneach", LocationType::Cities, &[13358]),
    EventDef::area("CITY_PORT_KHAZARD", "Port Khazard", LocationType::Cities, &[10545]),
    EventDef::area("CITY_PORT_PHASMATYS", "Port Phasmatys", LocationType::Cities, &[14646]),
    EventDef::area("CITY_PORT_SARIM", "Port Sarim", LocationType::Cities, &[12082]),
    EventDef::area(
        "CITY_PISCARILIUS_HOUSE",
        "Port Piscarilius",
        LocationType::Cities,
        &[6971, 7227, 6970, 7226],
    ),
    EventDef::area(
        "CITY_PRIFDDINAS",
        "Prifddinas",
        LocationType::Cities,
        &[12894, 12895, 13150, 13151],
    ),
    EventDef::area("CITY_RELLEKKA", "Rellekka", LocationType::Cities, &[10553]),
    EventDef::area("CITY_RIMMINGTON", "Rimmington", LocationType::Cities, &[11826, 11570]),
    EventDef::area("CITY_SEERS_VILLAGE", "Seers' Village", LocationType::Cities, &[10806]),
    EventDef::area(
        "CITY_SHAYZIEN_HOUSE",
        "Shayzien",
        LocationType::Cities,
        &[5944, 5943, 6200, 6199, 5688],
    ),
    EventDef::area("CITY_SHILO_VILLAGE", "Shilo Village", LocationType::Cities, &[11310]),
    EventDef::area("CITY_SOPHANEM", "Sophanem", LocationType::Cities, &[13099]),
    EventDef::area("CITY_TAI_BWO_WANNAI", "Tai Bwo Wannai", LocationType::Cities, &[11056, 11055]),
    EventDef::area("CITY_TAVERLEY", "Taverley", LocationType::Cities, &[11574, 11573]),
    EventDef::area(
        "CITY_TREE_GNOME_STRONGHOLD",
        "Tree Gnome Stronghold",
        LocationType::Cities,
        &[9782, 9781],
    ),
    EventDef::area("CITY_TREE_GNOME_VILLAGE", "Tree Gnome Village", LocationType::Cities, &[10033]),
    EventDef::area("CITY_TROLL_STRONGHOLD", "Troll Stronghold", LocationType::Cities, &[11321]),
    EventDef::area("CITY_TYRAS_CAMP", "Tyras Camp", LocationType::Cities, &[8753, 8752]),
    EventDef::area("CITY_UZER", "Uzer", LocationType::Cities, &[13872]),
    EventDef::area(
        "CITY_VARROCK",
        "Varrock",
        LocationType::Cities,
        &[12596, 12597, 12598, 12852, 12853, 12854, 13108, 13109, 13110],
    ),
    EventDef::area("CITY_WITCHHAVEN", "Witchaven", LocationType::Cities, &[10803]),
    EventDef::area(
        "CITY_WOODCUTTING_GUILD",
        "Woodcutting Guild",
        LocationType::Cities,
        &[6454, 6198, 6298],
    ),
    EventDef::area("CITY_YANILLE", "Yanille", LocationType::Cities, &[10288, 10032]),
    EventDef::area("CITY_ZANARIS", "Zanaris", LocationType::Cities, &[9285, 9541, 9540, 9797]),
    EventDef::area("CITY_ZULANDRA", "Zul-Andra", LocationType::Cities, &[8751]),
    // dungeons
    EventDef::area(
        "DUNGEON_ABANDONED_MINE",
        "Abandoned Mine",
        LocationType::Dungeons,
        &[13718, 11079, 11078, 11077, 10823, 10822, 10821],
    ),
    EventDef::area("DUNGEON_AH_ZA_RHOON", "Ah Za Rhoon", LocationType::Dungeons, &[11666]),
    EventDef::area(
        "DUNGEON_ANCIENT_CAVERN",
        "Ancient Cavern",
        LocationType::Dungeons,
        &[6483, 6995],
    ),
    EventDef::area(
        "DUNGEON_APE_ATOLL",
        "Ape Atoll Dungeon",
        LocationType::Dungeons,
        &[11150, 10894],
    ),
    EventDef::area("DUNGEON_ARDY_SEWERS", "Ardougne Sewers", LocationType::Dungeons, &[10136]),
    EventDef::area(
        "DUNGEON_ASGARNIAN_ICE_CAVES",
        "Asgarnian Ice Caves",
        LocationType::Dungeons,
        &[12181],
    ),
    EventDef::area(
        "DUNGEON_BRIMHAVEN",
        "Brimhaven Dungeon",
        LocationType::Dungeons,
        &[10901, 10900, 10899, 10645, 10644, 10643],
    ),
    EventDef::area(
        "DUNGEON_BRINE_RAT_CAVERN",
        "Brine Rat Cavern",
        LocationType::Dungeons,
        &[10910],
    ),
    EventDef::area(
        "DUNGEON_CATACOMBS_OF_KOUREND",
        "Catacombs of Kourend",
        LocationType::Dungeons,
        &[6557, 6556, 6813, 6812],
    ),
    EventDef::area("DUNGEON_CHASM_OF_FIRE", "Chasm of Fire", LocationType::Dungeons, &[5789]),
    EventDef::area("DUNGEON_CLOCK_TOWER", "Clock Tower Basement", LocationType::Dungeons, &[10390]),
    EventDef::area(
        "DUNGEON_CORSAIR_COVE",
        "Corsair Cove Dungeon",
        LocationType::Dungeons,
        &[8076, 8332],
    ),
    EventDef::area(
        "DUNGEON_CRABCLAW_CAVES",
        "Crabclaw Caves",
        LocationType::Dungeons,
        &[6553, 6809],
    ),
    EventDef::area("DUNGEON_DIGSITE", "Digsite Dungeon", LocationType::Dungeons, &[13465]),
    EventDef::area(
        "DUNGEON_DORGESHKAAN",
        "Dorgesh-Kaan South Dungeon",
        LocationType::Dungeons,
        &[10833],
    ),
    EventDef::area(
        "DUNGEON_DORGESHUUN_MINES",
        "Dorgeshuun Mines",
        LocationType::Dungeons,
        &[12950, 13206],
    ),
    EventDef::area(
        "DUNGEON_DRAYNOR_SEWERS",
        "Draynor Sewers",
        LocationType::Dungeons,
        &[12439, 12438],
    ),
    EventDef::area(
        "DUNGEON_DWARVEN_MINES",
        "Dwarven Mines",
        LocationType::Dungeons,
        &[12185, 12184, 12183],
    ),
    EventDef::area("DUNGEON_EAGLES_PEAK", "Eagles' Peak Dungeon", LocationType::Dungeons, &[8013]),
    EventDef::area(
        "DUNGEON_EDGEVILLE",
        "Edgeville Dungeon",
        LocationType::Dungeons,
        &[12441, 12442, 12443, 12698],
    ),
    EventDef::area(
        "DUNGEON_ELEMENTAL_WORKSHOP",
        "Elemental Workshop",
        LocationType::Dungeons,
        &[10906, 7760],
    ),
    EventDef::area("DUNGEON_ENAKHRAS_TEMPLE", "Enakhra's Temple", LocationType::Dungeons, &[12423]),
    EventDef::area("DUNGEON_ENTRANA", "Entrana Dungeon", LocationType::Dungeons, &[11416]),
    EventDef::area(
        "DUNGEON_EVIL_CHICKENS_LAIR",
        "Evil Chicken's Lair",
        LocationType::Dungeons,
        &[9796],
    ),
    EventDef::area(
        "DUNGEON_EXPERIMENT_CAVE",
        "Experiment Cave",
        LocationType::Dungeons,
        &[14235, 13979],
    ),
    EventDef::area(
        "DUNGEON_FREMENNIK_SLAYER",
        "Fremennik Slayer Dungeon",
        LocationType::Dungeons,
        &[10908, 11164],
    ),
    EventDef::area("DUNGEON_GOBLIN_CAVE", "Goblin Cave", LocationType::Dungeons, &[10393]),
    EventDef::area(
        "DUNGEON_GRAND_TREE_TUNNELS",
        "Grand Tree Tunnels",
        LocationType::Dungeons,
        &[9882],
    ),
    EventDef::area("DUNGEON_HAM", "H.A.M Dungeon", LocationType::Dungeons, &[12694, 10321]),
    EventDef::area(
        "DUNGEON_IORWERTH",
        "Iorwerth Dungeon",
        LocationType::Dungeons,
        &[12737, 12738, 12993, 12994],
    ),
    EventDef::area("DUNGEON_JATIZSO_MINES", "Jatizso Mines", LocationType::Dungeons, &[9631]),
    EventDef::area(
        "DUNGEON_JIGGIG_BURIAL_TOMB",
        "Jiggig Burial Tomb",
        LocationType::Dungeons,
        &[9875, 9874],
    ),
    EventDef::area("DUNGEON_JOGRE", "Jogre Dungeon", LocationType::Dungeons, &[11412]),
    EventDef::area(
        "DUNGEON_KARAMJA_VOLCANO",
        "Karamja Volcano",
        LocationType::Dungeons,
        &[11413, 11414],
    ),
    EventDef::area(
        "DUNGEON_KARUULM",
        "Karuulm Slayer Dungeon",
        LocationType::Dungeons,
        &[5280, 5279, 5023, 5535, 5022, 4766, 4510, 4511, 4767, 4768, 4512],
    ),
    EventDef::area("DUNGEON_KHARAZI", "Khazari Dungeon", LocationType::Dungeons, &[11153]),
    EventDef::area("DUNGEON_LIGHTHOUSE", "Lighthouse", LocationType::Dungeons, &[10140]),
    EventDef::area("DUNGEON_LIZARDMAN_CAVES", "Lizardman Caves", LocationType::Dungeons, &[5275]),
    EventDef::area(
        "DUNGEON_LUMBRIDGE_SWAMP_CAVES",
        "Lumbridge Swamp Caves",
        LocationType::Dungeons,
        &[12693, 12949],
    ),
    EventDef::area("DUNGEON_LUNAR_ISLE_MINE", "Lunar Isle Mine", LocationType::Dungeons, &[9377]),
    EventDef::area(
        "DUNGEON_MISCELLANIA",
        "Miscellania Dungeon",
        LocationType::Dungeons,
        &[10144, 10400],
    ),
    EventDef::area("DUNGEON_MOGRE_CAMP", "Mogre Camp", LocationType::Dungeons, &[11924]),
    EventDef::area(
        "DUNGEON_MOS_LE_HARMLESS_CAVES",
        "Mos Le'Harmless Caves",
        LocationType::Dungeons,
        &[14994, 14995, 15251],
    ),
    EventDef::area("DUNGEON_MOUSE_HOLE", "Mouse Hole", LocationType::Dungeons, &[9046]),
    EventDef::area("DUNGEON_OBSERVATORY", "Observatory Dungeon", LocationType::Dungeons, &[9362]),
    EventDef::area("DUNGEON_OGRE_ENCLAVE", "Ogre Enclave", LocationType::Dungeons, &[10387]),
    EventDef::area("DUNGEON_QUIDAMORTEM_CAVE", "Quidamortem Cave", LocationType::Dungeons, &[4763]),
    EventDef::area(
        "DUNGEON_RASHILIYIAS_TOMB",
        "Rashiliyta's Tomb",
        LocationType::Dungeons,
        &[11668],
    ),
    EventDef::area(
        "DUNGEON_SARADOMINSHRINE",
        "Saradomin Shrine (Paterdomus)",
        LocationType::Dungeons,
        &[13722],
    ),
    EventDef::area("DUNGEON_SHADE_CATACOMBS", "Shade Catacombs", LocationType::Dungeons, &[13975]),
    EventDef::area("DUNGEON_SHAYZIEN_CRYPTS", "Shayzien Crypts", LocationType::Dungeons, &[6043]),
    EventDef::area("DUNGEON_SMOKE", "Smoke Dungeon", LocationType::Dungeons, &[12946, 13202]),
    EventDef::area("DUNGEON_SOPHANEM", "Sophanem Dungeon", LocationType::Dungeons, &[13200]),
    EventDef::area(
        "DUNGEON_STRONGHOLD_SECURITY",
        "Stronghold of Security",
        LocationType::Dungeons,
        &[7505, 8017, 8530, 9297],
    ),
    EventDef::area("DUNGEON_TARNS_LAIR", "Tarn's Lair", LocationType::Dungeons, &[12616, 12615]),
    EventDef::area(
        "DUNGEON_TAVERLEY",
        "Taverley Dungeon",
        LocationType::Dungeons,
        &[11673, 11672, 11929, 11928, 11417],
    ),
    EventDef::area(
        "DUNGEON_TEMPLE_OF_IKOV",
        "Temple of Ikov",
        LocationType::Dungeons,
        &[10649, 10905, 10650],
    ),
    EventDef::area(
        "DUNGEON_TEMPLE_OF_MARIMBO",
        "Temple of Marimbo",
        LocationType::Dungeons,
        &[11151],
    ),
    EventDef::area("DUNGEON_THE_WARRENS", "The Warrens", LocationType::Dungeons, &[7070, 7326]),
    EventDef::area("DUNGEON_TOLNA", "Dungeon of Tolna", LocationType::Dungeons, &[13209]),
    EventDef::area(
        "DUNGEON_TOWER_OF_LIFE",
        "Tower of Life Basement",
        LocationType::Dungeons,
        &[12100],
    ),
    EventDef::area("DUNGEON_TRAHAEARN_MINE", "Trahaearn Mine", LocationType::Dungeons, &[13249]),
    EventDef::area("DUNGEON_TUNNEL_OF_CHAOS", "Tunnel of Chaos", LocationType::Dungeons, &[12625]),
    EventDef::area(
        "DUNGEON_UNDERGROUND_PASS",
        "Underground Pass",
        LocationType::Dungeons,
        &[9369, 9370],
    ),
    EventDef::area(
        "DUNGEON_VARROCKSEWERS",
        "Varrock Sewers",
        LocationType::Dungeons,
        &[12954, 13210],
    ),
    EventDef::area("DUNGEON_WATER_RAVINE", "Water Ravine", LocationType::Dungeons, &[13461]),
    EventDef::area(
        "DUNGEON_WATERBIRTH",
        "Waterbirth Dungeon",
        LocationType::Dungeons,
        &[9886, 10142, 7492, 7748],
    ),
    EventDef::area("DUNGEON_WATERFALL", "Waterfall Dungeon", LocationType::Dungeons, &[10394]),
    EventDef::area(
        "DUNGEON_WHITE_WOLF_MOUNTAIN_CAVES",
        "White Wolf Mountain Caves",
        LocationType::Dungeons,
        &[11418, 11419, 11675],
    ),
    EventDef::area(
        "DUNGEON_WITCHAVEN_SHRINE",
        "Witchhaven Shrine Dungeon",
        LocationType::Dungeons,
        &[10903],
    ),
    EventDef::area(
        "DUNGEON_YANILLE_AGILITY",
        "Yanille Agility Dungeon",
        LocationType::Dungeons,
        &[10388],
    ),
    EventDef::area(
        "DUNGEON_MOTHERLODE_MINE",
        "Motherlode Mine",
        LocationType::Dungeons,
        &[14679, 14680, 14681, 14935, 14936, 14937, 15191, 15192, 15193],
    ),
    EventDef::area(
        "DUNGEON_NIGHTMARE",
        "Nightmare Dungeon",
        LocationType::Dungeons,
        &[14999, 15000, 15001, 15255, 15256, 15257, 15511, 15512, 15513],
    ),
    // minigames
    EventDef::area("MG_BARBARIAN_ASSAULT", "Barbarian Assault", LocationType::Minigames, &[10332]),
    EventDef::area("MG_BARROWS", "Barrows", LocationType::Minigames, &[14131, 14231]),
    EventDef::area("MG_BLAST_FURNACE", "Blast Furnace", LocationType::Minigames, &[7757]),
    EventDef::area(
        "MG_BRIMHAVEN_AGILITY_ARENA",
        "Brimhaven Agility Arena",
        LocationType::Minigames,
        &[11157],
    ),
    EventDef::area(
        "MG_BURTHORPE_GAMES_ROOM",
        "Burthorpe Games Room",
        LocationType::Minigames,
        &[8781],
    ),
    EventDef::area("MG_CASTLE_WARS", "Castle Wars", LocationType::Minigames, &[9520]),
    EventDef::area(
        "MG_CLAN_WARS",
        "Clan Wars",
        LocationType::Minigames,
        &[13135, 13134, 13133, 13131, 13130, 13387, 13386],
    ),
    EventDef::area("MG_DUEL_ARENA", "Duel Arena", LocationType::Minigames, &[13362]),
    EventDef::area("MG_FISHING_TRAWLER", "Fishing Trawler", LocationType::Minigames, &[7499]),
    EventDef::area("MG_GAUNTLET", "Gauntlet", LocationType::Minigames, &[12995]),
    EventDef::area("MG_INFERNO", "The Inferno", LocationType::Minigames, &[9043]),
    EventDef::area(
        "MG_LAST_MAN_STANDING",
        "Last Man Standing",
        LocationType::Minigames,
        &[13660, 13659, 13658, 13916, 13915, 13914],
    ),
    EventDef::area(
        "MG_HALLOWED_SEPULCHRE",
        "Hallowed Sepulchre",
        LocationType::Minigames,
        &[8797, 9051, 9052, 9053, 9054, 9309, 9563, 9565, 9821, 10074, 10075, 10077],
    ),
    EventDef::area(
        "MG_MAGE_TRAINING_ARENA",
        "Mage Training Arena",
        LocationType::Minigames,
        &[13462, 13463],
    ),
    EventDef::area("MG_NIGHTMARE_ZONE", "Nightmare Zone", LocationType::Minigames, &[9033]),
    EventDef::area("MG_PEST_CONTROL", "Pest Control", LocationType::Minigames, &[10536]),
    EventDef::area("MG_PYRAMID_PLUNDER", "Pyramid Plunder", LocationType::Minigames, &[7749]),
    EventDef::area(
        "MG_ROGUES_DEN",
        "Rogues' Den",
        LocationType::Minigames,
        &[11855, 11854, 12111, 12110],
    ),
    EventDef::area("MG_SORCERESS_GARDEN", "Sorceress's Garden", LocationType::Minigames, &[11605]),
    EventDef::area(
        "MG_TEMPLE_TREKKING",
        "Temple Trekking",
        LocationType::Minigames,
        &[8014, 8270, 8256, 8782, 9038, 9294, 9550, 9806],
    ),
    EventDef::area("MG_TITHE_FARM", "Tithe Farm", LocationType::Minigames, &[6968]),
    EventDef::area("MG_TROUBLE_BREWING", "Trouble Brewing", LocationType::Minigames, &[15150]),
    EventDef::area("MG_TZHAAR_FIGHT_CAVES", "Tzhaar Fight Caves", LocationType::Minigames, &[9551]),
    EventDef::area("MG_TZHAAR_FIGHT_PITS", "Tzhaar Fight Pits", LocationType::Minigames, &[9552]),
    EventDef::area("MG_VOLCANIC_MINE", "Volcanic Mine", LocationType::Minigames, &[15263, 15262]),
    // raids
    EventDef::varbit(
        "RAIDS_CHAMBERS_OF_XERIC",
        "Chambers of Xeric",
        LocationType::Raids,
        VARBIT_IN_RAID,
    ),
    EventDef::varbit(
        "RAIDS_THEATRE_OF_BLOOD",
        "Theatre of Blood",
        LocationType::Raids,
        VARBIT_THEATRE_OF_BLOOD,
    ),
    EventDef::area("POI_FISHING_GUILD", "Fishing Guild", LocationType::Poi, &[10293]),
    EventDef::area("POI_OTTOS_GROTTO", "Otto's Grotto", LocationType::Poi, &[10038]),
    EventDef::area("POI_PLAYER_OWNED_HOUSE", "Player Owned House", LocationType::Poi, &[7769]),
];

/// Host-side context used to override region classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaFlags {
    /// The wilderness level indicator is visible and non-empty.
    pub wilderness: bool,
    pub deadman_world: bool,
    pub pvp_world: bool,
}

/// Event table plus lookup indices.
#[derive(Debug, Clone)]
pub struct Catalog {
    events: Vec<EventDef>,
    by_id: HashMap<&'static str, usize>,
    by_region: HashMap<u32, usize>,
    by_skill: HashMap<Skill, usize>,
    by_varbit: Vec<usize>,
    idle_root: Option<&'static str>,
}

static BUILTIN: LazyLock<Catalog> =
    LazyLock::new(|| Catalog::index(GAME_EVENTS.to_vec(), Some(IDLE_ROOT)));

impl Catalog {
    /// The built-in game catalog with `IN_MENU` as idle root.
    #[must_use]
    pub fn builtin() -> &'static Self {
        &BUILTIN
    }

    /// Custom catalog. Ids and region ids must be unique.
    ///
    /// # Errors
    /// `InvalidConfig` on duplicate ids, duplicate regions, or an unknown idle root.
    pub fn new(events: Vec<EventDef>, idle_root: Option<&'static str>) -> Result<Self> {
        let mut ids = HashSet::new();
        let mut regions = HashMap::new();
        for event in &events {
            if !ids.insert(event.id) {
                return Err(ItelError::InvalidConfig {
                    details: format!("duplicate event id {}", event.id),
                });
            }
            for region in event.regions {
                if let Some(other) = regions.insert(*region, event.id) {
                    return Err(ItelError::InvalidConfig {
                        details: format!("region {region} claimed by {other} and {}", event.id),
                    });
                }
            }
        }
        if let Some(root) = idle_root.filter(|root| !ids.contains(root)) {
            return Err(ItelError::InvalidConfig {
                details: format!("idle root {root} is not in the catalog"),
            });
        }
        Ok(Self::index(events, idle_root))
    }

    fn index(events: Vec<EventDef>, idle_root: Option<&'static str>) -> Self {
        let mut by_id = HashMap::with_capacity(events.len());
        let mut by_region = HashMap::new();
        let mut by_skill = HashMap::new();
        let mut by_varbit = Vec::new();
        for (i, event) in events.iter().enumerate() {
            by_id.insert(event.id, i);
            if event.varbit.is_some() {
                by_varbit.push(i);
                continue;
            }
            if let Some(skill) = event.skill {
                by_skill.insert(skill, i);
                continue;
            }
            for region in event.regions {
                by_region.insert(*region, i);
            }
        }
        Self {
            events,
            by_id,
            by_region,
            by_skill,
            by_varbit,
            idle_root,
        }
    }

    #[must_use]
    pub fn events(&self) -> &[EventDef] {
        &self.events
    }

    #[must_use]
    pub fn idle_root(&self) -> Option<&'static str> {
        self.idle_root
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&EventDef> {
        self.by_id.get(id).map(|&i| &self.events[i])
    }

    #[must_use]
    pub fn from_region(&self, region: u32) -> Option<&EventDef> {
        self.by_region.get(&region).map(|&i| &self.events[i])
    }

    #[must_use]
    pub fn from_skill(&self, skill: Skill) -> Option<&EventDef> {
        self.by_skill.get(&skill).map(|&i| &self.events[i])
    }

    /// First varbit event whose flag reads non-zero through `probe`.
    pub fn from_varbit(&self, probe: impl Fn(u32) -> i64) -> Option<&EventDef> {
        self.by_varbit
            .iter()
            .map(|&i| &self.events[i])
            .find(|event| event.varbit.is_some_and(|v| probe(v) != 0))
    }

    /// Classify the player's area, applying host-side overrides.
    ///
    /// Region 0 means "no position yet" and yields nothing. The shared
    /// NMZ/KBD region is King Black Dragon on plane 0. Otherwise a visible
    /// wilderness indicator, then the world kind, take precedence over the
    /// region table, and an unknown region falls back to `IN_GAME`.
    #[must_use]
    pub fn classify_area(&self, region: u32, plane: i32, flags: AreaFlags) -> Option<&EventDef> {
        if region == 0 {
            return None;
        }
        let found = self.from_region(region);
        let id = match found {
            Some(event) if event.id == MG_NIGHTMARE_ZONE && plane == 0 => BOSS_KING_BLACK_DRAGON,
            _ if flags.wilderness => WILDERNESS,
            _ if flags.deadman_world => PLAYING_DEADMAN,
            _ if flags.pvp_world => PLAYING_PVP,
            Some(event) => return Some(event),
            None => IN_GAME,
        };
        self.get(id)
    }
}
