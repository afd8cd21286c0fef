//! Static data registries.
//!
//! This module provides:
//! - Unit, projectile and map stat blocks loaded from RON
//! - Validation on load
//! - Lane direction fields, generated when a map does not list one
//! - Immutable lookup by name for the systems
//!
//! Built-in data ships inside the crate; [`Registries::load_dir`] replaces
//! any of the three tables with files from disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use ahash::AHashMap;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use arena_common::{direction_to, ConfigError, Team, UnitClass};

use crate::attack::{AttackBehavior, Behavior, SpecialPower};
use crate::components::StructureKind;

/// Unit stats file name.
pub const UNITS_FILE: &str = "units.ron";
/// Projectile stats file name.
pub const PROJECTILES_FILE: &str = "projectiles.ron";
/// Map definitions file name.
pub const MAPS_FILE: &str = "maps.ron";

const BUILTIN_UNITS: &str = include_str!("../data/units.ron");
const BUILTIN_PROJECTILES: &str = include_str!("../data/projectiles.ron");
const BUILTIN_MAPS: &str = include_str!("../data/maps.ron");

/// Projectile type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileStats {
    /// Registry name
    pub name: String,
    /// Distance per tick
    pub speed: f32,
    /// Collision radius for straight flight
    pub radius: f32,
    /// Launch and aim height above an entity's origin
    pub center_offset: f32,
    /// Travel budget for straight flight
    pub range: f32,
}

fn one() -> u32 {
    1
}

fn positive(v: f32) -> bool {
    v.is_finite() && v > 0.0
}

/// Special-power block of a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialStats {
    /// Frames per charged cycle
    pub rate: i32,
    /// Charge needed to cast
    pub max_charge: u32,
    /// Charge gained per normal hit
    #[serde(default = "one")]
    pub charge_per_attack: u32,
    /// First frame of the damage window
    pub damage_frame: i32,
    /// Last frame of the damage window
    pub damage_end_frame: i32,
    /// Edge-distance reach while charged
    pub attack_radius: f32,
    /// Whether the power may be aimed at a structure
    pub structure_targetable: bool,
    /// What the power does
    pub power: SpecialPower<String>,
}

/// Unit or structure stat block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitStats {
    /// Registry name
    pub name: String,
    /// Class tag
    pub class: UnitClass,
    /// Gold cost to deploy
    #[serde(default)]
    pub cost: f32,
    /// Maximum health
    pub health: f32,
    /// Collision radius
    pub radius: f32,
    /// Distance per tick
    #[serde(default)]
    pub speed: f32,
    /// Damage per normal hit
    pub damage: f32,
    /// Frames per attack cycle
    pub attack_rate: i32,
    /// Frame on which a normal hit lands
    pub damage_frame: i32,
    /// Edge-distance reach of the normal attack
    pub attack_radius: f32,
    /// Edge-distance reach for noticing enemies
    pub aggro_radius: f32,
    /// Normal attack
    pub attack: AttackBehavior<String>,
    /// Charged attack
    #[serde(default)]
    pub special: Option<SpecialStats>,
    /// Tower or base, for structures
    #[serde(default)]
    pub structure: Option<StructureKind>,
}

impl UnitStats {
    /// Whether a player may deploy this unit from hand.
    #[must_use]
    pub fn is_deployable(&self) -> bool {
        self.class.is_mobile()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let fail = |reason: &str| {
            Err(ConfigError::InvalidStats {
                name: self.name.clone(),
                reason: reason.to_string(),
            })
        };
        if !positive(self.radius) {
            return fail("radius must be positive");
        }
        if !positive(self.health) {
            return fail("health must be positive");
        }
        if self.attack_rate <= 0 {
            return fail("attack_rate must be positive");
        }
        if !(0..=self.attack_rate).contains(&self.damage_frame) {
            return fail("damage_frame outside the attack cycle");
        }
        if self.aggro_radius < self.attack_radius {
            return fail("aggro_radius is shorter than attack_radius");
        }
        if (self.class == UnitClass::Structure) != self.structure.is_some() {
            return fail("structure kind must be set exactly for structures");
        }
        if self.class.is_mobile() && !positive(self.speed) {
            return fail("mobile units need a positive speed");
        }
        if let Err(reason) = self.attack.validate() {
            return fail(reason);
        }
        if let Some(sp) = &self.special {
            if self.class == UnitClass::Structure {
                return fail("structures cannot carry a special power");
            }
            if sp.rate <= 0 || sp.max_charge == 0 {
                return fail("special rate and max_charge must be positive");
            }
            if sp.damage_frame < 0 || sp.damage_frame > sp.damage_end_frame || sp.damage_end_frame > sp.rate {
                return fail("special damage window outside the charged cycle");
            }
            if let Err(reason) = sp.power.validate() {
                return fail(reason);
            }
        }
        Ok(())
    }
}

/// A point in a map file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapPoint {
    /// X coordinate
    pub x: f32,
    /// Y coordinate
    pub y: f32,
}

impl From<MapPoint> for Vec2 {
    fn from(p: MapPoint) -> Self {
        Vec2::new(p.x, p.y)
    }
}

/// A structure placed when a match starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Structure unit name
    pub unit: String,
    /// Owning team
    pub team: Team,
    /// Location
    pub at: MapPoint,
}

/// One entry of an explicit lane field, in grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LaneVector {
    /// Grid column
    pub x: i32,
    /// Grid row
    pub y: i32,
    /// Direction x
    pub dx: f32,
    /// Direction y
    pub dy: f32,
}

/// Map definition as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapDef {
    /// Registry name
    pub name: String,
    /// Extent along x
    pub width: f32,
    /// Extent along y
    pub height: f32,
    /// Lane field grid increment
    pub lane_step: f32,
    /// Blue base location
    pub blue_base: MapPoint,
    /// Red base location
    pub red_base: MapPoint,
    /// Structures spawned at match start
    pub structures: Vec<Placement>,
    /// Explicit lane field; generated when empty
    #[serde(default)]
    pub lanes: Vec<LaneVector>,
}

/// Sparse direction field keyed by grid point, oriented for the blue team.
#[derive(Debug, Clone)]
pub struct LaneField {
    step: f32,
    vectors: AHashMap<(i32, i32), Vec2>,
}

impl LaneField {
    /// Builds a field from explicit vectors.
    #[must_use]
    pub fn from_vectors(step: f32, lanes: &[LaneVector]) -> Self {
        let vectors = lanes
            .iter()
            .map(|l| ((l.x, l.y), Vec2::new(l.dx, l.dy).normalize_or_zero()))
            .collect();
        Self { step, vectors }
    }

    /// Generates a field that bends away from the blue base and into the
    /// red one. Its negation does the same for the red team.
    #[must_use]
    pub fn generate(step: f32, width: f32, height: f32, blue: Vec2, red: Vec2) -> Self {
        let columns = (width / step).floor() as i32;
        let rows = (height / step).floor() as i32;
        let mut vectors = AHashMap::with_capacity(((columns + 1) * (rows + 1)) as usize);
        for gx in 0..=columns {
            for gy in 0..=rows {
                let p = Vec2::new(gx as f32, gy as f32) * step;
                let away = direction_to(blue, p);
                let toward = direction_to(p, red);
                let mut v = (away + toward).normalize_or_zero();
                if v == Vec2::ZERO {
                    v = direction_to(blue, red);
                }
                vectors.insert((gx, gy), v);
            }
        }
        Self { step, vectors }
    }

    /// Grid point nearest to `p`.
    #[must_use]
    pub fn key_of(&self, p: Vec2) -> (i32, i32) {
        ((p.x / self.step).round() as i32, (p.y / self.step).round() as i32)
    }

    /// Blue-oriented direction at the grid point nearest to `p`.
    #[must_use]
    pub fn direction(&self, p: Vec2) -> Option<Vec2> {
        self.vectors.get(&self.key_of(p)).copied()
    }

    /// Number of grid points with a vector.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Whether the field is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

/// A loaded map.
#[derive(Debug, Clone)]
pub struct Map {
    def: MapDef,
    lanes: LaneField,
}

impl Map {
    /// Builds the runtime map, generating its lane field if needed.
    pub fn new(def: MapDef) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidStats {
            name: def.name.clone(),
            reason: reason.to_string(),
        };
        if !(positive(def.width) && positive(def.height)) {
            return Err(invalid("map extent must be positive"));
        }
        if !positive(def.lane_step) {
            return Err(invalid("lane_step must be positive"));
        }
        let lanes = if def.lanes.is_empty() {
            LaneField::generate(
                def.lane_step,
                def.width,
                def.height,
                def.blue_base.into(),
                def.red_base.into(),
            )
        } else {
            LaneField::from_vectors(def.lane_step, &def.lanes)
        };
        debug!(map = %def.name, points = lanes.len(), "Built lane field");
        Ok(Self { def, lanes })
    }

    /// Registry name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Definition this map was built from.
    #[must_use]
    pub fn def(&self) -> &MapDef {
        &self.def
    }

    /// Lane field.
    #[must_use]
    pub fn lanes(&self) -> &LaneField {
        &self.lanes
    }

    /// Whether `p` lies inside the map.
    #[must_use]
    pub fn contains(&self, p: Vec2) -> bool {
        (0.0..=self.def.width).contains(&p.x) && (0.0..=self.def.height).contains(&p.y)
    }

    /// Clamps `p` into the map.
    #[must_use]
    pub fn clamp(&self, p: Vec2) -> Vec2 {
        p.clamp(Vec2::ZERO, Vec2::new(self.def.width, self.def.height))
    }

    /// Location of `team`'s base.
    #[must_use]
    pub fn base(&self, team: Team) -> Vec2 {
        match team {
            Team::Blue => self.def.blue_base.into(),
            Team::Red => self.def.red_base.into(),
        }
    }

    /// Lane direction for a `team` unit at `p`.
    ///
    /// Points without a field vector head straight for the enemy base.
    #[must_use]
    pub fn lane_direction(&self, p: Vec2, team: Team) -> Vec2 {
        match self.lanes.direction(p) {
            Some(v) if team == Team::Red => -v,
            Some(v) => v,
            None => direction_to(p, self.base(team.opponent())),
        }
    }

    /// Distance from `p` to the base `team` is attacking.
    #[must_use]
    pub fn distance_to_enemy_base(&self, p: Vec2, team: Team) -> f32 {
        p.distance(self.base(team.opponent()))
    }
}

/// All static data, immutable after load.
#[derive(Debug, Clone)]
pub struct Registries {
    units: BTreeMap<String, UnitStats>,
    projectiles: BTreeMap<String, ProjectileStats>,
    maps: BTreeMap<String, Map>,
}

fn parse<T: for<'de> Deserialize<'de>>(source: &str, what: &str) -> Result<Vec<T>, ConfigError> {
    ron::from_str(source).map_err(|e| ConfigError::Parse(format!("{what}: {e}")))
}

fn read_or(dir: &Path, file: &str, builtin: &'static str) -> Result<String, ConfigError> {
    let path = dir.join(file);
    if !path.exists() {
        debug!(path = %path.display(), "Registry file missing, using built-in data");
        return Ok(builtin.to_string());
    }
    fs::read_to_string(&path).map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))
}

impl Registries {
    /// Data bundled with the crate.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_ron(BUILTIN_UNITS, BUILTIN_PROJECTILES, BUILTIN_MAPS)
    }

    /// Parses and validates the three tables.
    pub fn from_ron(units: &str, projectiles: &str, maps: &str) -> Result<Self, ConfigError> {
        let units: Vec<UnitStats> = parse(units, UNITS_FILE)?;
        let projectiles: Vec<ProjectileStats> = parse(projectiles, PROJECTILES_FILE)?;
        let maps: Vec<MapDef> = parse(maps, MAPS_FILE)?;

        let registries = Self {
            units: units.into_iter().map(|u| (u.name.clone(), u)).collect(),
            projectiles: projectiles.into_iter().map(|p| (p.name.clone(), p)).collect(),
            maps: maps
                .into_iter()
                .map(|def| Ok((def.name.clone(), Map::new(def)?)))
                .collect::<Result<_, ConfigError>>()?,
        };
        registries.validate()?;
        Ok(registries)
    }

    /// Loads tables from `dir`, using built-in data for any missing file.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let registries = Self::from_ron(
            &read_or(dir, UNITS_FILE, BUILTIN_UNITS)?,
            &read_or(dir, PROJECTILES_FILE, BUILTIN_PROJECTILES)?,
            &read_or(dir, MAPS_FILE, BUILTIN_MAPS)?,
        )?;
        info!(
            dir = %dir.display(),
            units = registries.units.len(),
            maps = registries.maps.len(),
            "Loaded registries"
        );
        Ok(registries)
    }

    /// Looks up a unit.
    pub fn unit(&self, name: &str) -> Result<&UnitStats, ConfigError> {
        self.units.get(name).ok_or_else(|| ConfigError::UnknownUnit(name.to_string()))
    }

    /// Looks up a projectile type.
    pub fn projectile(&self, name: &str) -> Result<&ProjectileStats, ConfigError> {
        self.projectiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProjectile(name.to_string()))
    }

    /// Looks up a map.
    pub fn map(&self, name: &str) -> Result<&Map, ConfigError> {
        self.maps.get(name).ok_or_else(|| ConfigError::UnknownMap(name.to_string()))
    }

    /// Every unit, ordered by name.
    pub fn units(&self) -> impl Iterator<Item = &UnitStats> {
        self.units.values()
    }

    /// Resolves a unit's attack and special power against the projectile table.
    pub fn behavior(&self, stats: &UnitStats) -> Result<Behavior, ConfigError> {
        let lookup = |name: String| self.projectile(&name).cloned();
        Ok(Behavior {
            attack: stats.attack.clone().resolve(lookup)?,
            special: stats
                .special
                .as_ref()
                .map(|sp| sp.power.clone().resolve(lookup))
                .transpose()?,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for stats in self.units.values() {
            stats.validate()?;
            self.behavior(stats)?;
        }
        for p in self.projectiles.values() {
            if !(positive(p.speed) && positive(p.radius) && positive(p.range)) {
                return Err(ConfigError::InvalidStats {
                    name: p.name.clone(),
                    reason: "projectile speed, radius and range must be positive".to_string(),
                });
            }
        }
        for map in self.maps.values() {
            for placement in &map.def.structures {
                let stats = self.unit(&placement.unit)?;
                if stats.structure.is_none() {
                    return Err(ConfigError::InvalidStats {
                        name: map.name().to_string(),
                        reason: format!("{} is not a structure", placement.unit),
                    });
                }
                if !map.contains(placement.at.into()) {
                    return Err(ConfigError::InvalidStats {
                        name: map.name().to_string(),
                        reason: format!("{} placed outside the map", placement.unit),
                    });
                }
            }
        }
        Ok(())
    }
}
