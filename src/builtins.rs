/// The built-in catalog: everything reachable under the reserved `mlog`
/// source name.
///
/// Three keyword constants, the environmental scalars, the sensable
/// properties, the content identifiers of the target game, and one callable
/// procedure per instruction form. The combinatorial families (`radar`,
/// `uradar`, `ulocate_building_*`) are enumerated at start-up from the small
/// descriptions below; the resulting identifier-to-template mapping is part
/// of the language surface.
///
/// HLML identifiers cannot contain dashes, so dashed upstream names are
/// carried with underscores and restored on emission: `phase_fabric` is the
/// constant `@phase-fabric`.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::sem::Known;

/// The reserved source name that holds the catalog.
pub const SOURCE_NAME: &str = "mlog";

// ---------------------------------------------------------------------------
// Procedure templates
// ---------------------------------------------------------------------------

/// An instruction template: the words emitted before the arguments, the
/// argument count, an optional dummy word injected between arguments, and
/// trailing `0` filler up to the instruction's full operand width.
#[derive(Debug, Clone)]
pub struct Procedure {
    pub identifier: String,
    pub opening: Vec<String>,
    pub parameters: usize,
    pub dummy: Option<Dummy>,
    pub padding: usize,
}

/// A fixed word that occupies an operand slot the caller does not supply,
/// emitted after the argument at index `after`.
#[derive(Debug, Clone, Copy)]
pub struct Dummy {
    pub after: usize,
    pub word: &'static str,
}

impl Procedure {
    fn new(identifier: impl Into<String>, opening: &[&str], parameters: usize) -> Self {
        Procedure {
            identifier: identifier.into(),
            opening: opening.iter().map(|word| word.to_string()).collect(),
            parameters,
            dummy: None,
            padding: 0,
        }
    }

    fn padded(identifier: impl Into<String>, opening: &[&str], parameters: usize, width: usize) -> Self {
        let mut procedure = Self::new(identifier, opening, parameters);
        procedure.padding = width - parameters;
        procedure
    }

    fn with_dummy(mut self, after: usize, word: &'static str) -> Self {
        self.dummy = Some(Dummy { after, word });
        self
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

pub struct Catalog {
    constants: HashMap<String, Known>,
    procedures: HashMap<String, Arc<Procedure>>,
}

impl Catalog {
    pub fn constant(&self, identifier: &str) -> Option<&Known> {
        self.constants.get(identifier)
    }

    pub fn procedure(&self, identifier: &str) -> Option<&Arc<Procedure>> {
        self.procedures.get(identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.constants.contains_key(identifier) || self.procedures.contains_key(identifier)
    }

    fn constant_entry(&mut self, identifier: &str) {
        let emitted = format!("@{}", identifier.replace('_', "-"));
        self.constants.insert(identifier.to_string(), Known::Builtin(emitted));
    }

    fn procedure_entry(&mut self, procedure: Procedure) {
        self.procedures
            .insert(procedure.identifier.clone(), Arc::new(procedure));
    }
}

/// The catalog is immutable and built once per process.
pub fn catalog() -> &'static Catalog {
    static CATALOG: Lazy<Catalog> = Lazy::new(build);
    &CATALOG
}

fn build() -> Catalog {
    let mut catalog = Catalog {
        constants: HashMap::new(),
        procedures: HashMap::new(),
    };

    catalog.constants.insert("true".to_string(), Known::True);
    catalog.constants.insert("false".to_string(), Known::False);
    catalog.constants.insert("null".to_string(), Known::Null);

    for table in [
        ENVIRONMENT,
        TEAMS,
        PROPERTIES,
        ITEMS,
        LIQUIDS,
        UNITS,
        BLOCKS,
        FLOORS,
    ] {
        for identifier in table {
            catalog.constant_entry(identifier);
        }
    }

    build_fixed_procedures(&mut catalog);
    build_draw(&mut catalog);
    build_control(&mut catalog);
    build_ucontrol(&mut catalog);
    build_operations(&mut catalog);
    build_lookup(&mut catalog);
    build_ulocate(&mut catalog);
    build_radar(&mut catalog);

    catalog
}

fn build_fixed_procedures(catalog: &mut Catalog) {
    for (identifier, parameters) in [
        ("read", 3),
        ("write", 3),
        ("drawflush", 1),
        ("packcolor", 5),
        ("print", 1),
        ("printflush", 1),
        ("getlink", 2),
        ("sensor", 3),
        ("wait", 1),
        ("stop", 0),
        ("ubind", 1),
    ] {
        catalog.procedure_entry(Procedure::new(identifier, &[identifier], parameters));
    }
}

/// `draw` sub-instructions are padded to six operands after the sub-word.
fn build_draw(catalog: &mut Catalog) {
    for (sub, parameters) in [
        ("clear", 3),
        ("color", 4),
        ("col", 1),
        ("stroke", 1),
        ("line", 4),
        ("rect", 4),
        ("lineRect", 4),
        ("poly", 5),
        ("linePoly", 5),
        ("triangle", 6),
        ("image", 5),
    ] {
        catalog.procedure_entry(Procedure::padded(
            format!("draw_{}", sub),
            &["draw", sub],
            parameters,
            6,
        ));
    }
}

/// `control` sub-instructions are padded to five operands after the sub-word.
fn build_control(catalog: &mut Catalog) {
    for (sub, parameters) in [
        ("enabled", 2),
        ("shoot", 4),
        ("shootp", 3),
        ("config", 2),
        ("color", 2),
    ] {
        catalog.procedure_entry(Procedure::padded(
            format!("control_{}", sub),
            &["control", sub],
            parameters,
            5,
        ));
    }
}

/// `ucontrol` sub-instructions are padded to five operands after the
/// sub-word.
fn build_ucontrol(catalog: &mut Catalog) {
    for (sub, parameters) in [
        ("idle", 0),
        ("stop", 0),
        ("move", 2),
        ("approach", 3),
        ("pathfind", 2),
        ("boost", 1),
        ("target", 3),
        ("targetp", 2),
        ("itemDrop", 2),
        ("itemTake", 3),
        ("payDrop", 0),
        ("payTake", 1),
        ("payEnter", 0),
        ("mine", 2),
        ("flag", 1),
        ("build", 5),
        ("getBlock", 4),
        ("within", 4),
        ("unbind", 0),
    ] {
        catalog.procedure_entry(Procedure::padded(
            format!("ucontrol_{}", sub),
            &["ucontrol", sub],
            parameters,
            5,
        ));
    }
}

/// The `op` operators that no HLML punctuation reaches.
fn build_operations(catalog: &mut Catalog) {
    for binary in ["pow", "land", "max", "min", "angle", "angleDiff", "len", "noise"] {
        catalog.procedure_entry(Procedure::new(
            format!("op_{}", binary),
            &["op", binary],
            3,
        ));
    }
    for unary in [
        "abs", "log", "log10", "floor", "ceil", "sqrt", "rand", "sin", "cos", "tan", "asin",
        "acos", "atan",
    ] {
        catalog.procedure_entry(Procedure::padded(
            format!("op_{}", unary),
            &["op", unary],
            2,
            3,
        ));
    }
}

fn build_lookup(catalog: &mut Catalog) {
    for kind in ["block", "unit", "item", "liquid"] {
        catalog.procedure_entry(Procedure::new(
            format!("lookup_{}", kind),
            &["lookup", kind],
            2,
        ));
    }
}

/// The `ulocate` forms. The full instruction is
/// `ulocate <find> <group> <enemy> <ore> <outX> <outY> <found> <building>`;
/// slots the form fixes are folded into the opening, and the building search
/// injects the ignored ore slot as a dummy after its enemy argument.
fn build_ulocate(catalog: &mut Catalog) {
    catalog.procedure_entry(Procedure::new(
        "ulocate_ore",
        &["ulocate", "ore", "core", "true"],
        5,
    ));
    catalog.procedure_entry(Procedure::new(
        "ulocate_spawn",
        &["ulocate", "spawn", "core", "true", "@copper"],
        4,
    ));
    catalog.procedure_entry(Procedure::new(
        "ulocate_damaged",
        &["ulocate", "damaged", "core", "true", "@copper"],
        4,
    ));
    for kind in [
        "core", "storage", "generator", "turret", "factory", "repair", "battery", "resupply",
        "reactor",
    ] {
        catalog.procedure_entry(
            Procedure::new(
                format!("ulocate_building_{}", kind),
                &["ulocate", "building", kind],
                5,
            )
            .with_dummy(0, "@copper"),
        );
    }
}

/// `radar` filters, in slot-index order, and the sort metrics.
pub const RADAR_FILTERS: &[&str] = &[
    "enemy", "ally", "player", "attacker", "flying", "boss", "ground",
];
pub const RADAR_METRICS: &[&str] = &["distance", "health", "shield", "armor", "maxHealth"];

/// Every ordered selection of 0–3 filters, combined with every metric, in
/// both the building-based (`radar`) and bound-unit (`uradar`) forms.
fn build_radar(catalog: &mut Catalog) {
    for mask in 0u32..(1 << RADAR_FILTERS.len()) {
        if mask.count_ones() > 3 {
            continue;
        }
        let selected: Vec<&str> = RADAR_FILTERS
            .iter()
            .enumerate()
            .filter(|(index, _)| mask & (1 << index) != 0)
            .map(|(_, filter)| *filter)
            .collect();
        let mut slots = ["any"; 3];
        for (slot, &filter) in selected.iter().enumerate() {
            slots[slot] = filter;
        }
        for &metric in RADAR_METRICS {
            let suffix: String = selected
                .iter()
                .copied()
                .chain(std::iter::once(metric))
                .map(|word| format!("_{}", word))
                .collect();
            catalog.procedure_entry(Procedure::new(
                format!("radar{}", suffix),
                &["radar", slots[0], slots[1], slots[2], metric],
                3,
            ));
            catalog.procedure_entry(Procedure::new(
                format!("uradar{}", suffix),
                &["uradar", slots[0], slots[1], slots[2], metric, "0"],
                2,
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// Constant tables
// ---------------------------------------------------------------------------

/// Game-state scalars.
const ENVIRONMENT: &[&str] = &[
    "pi",
    "e",
    "time",
    "tick",
    "second",
    "minute",
    "counter",
    "waveNumber",
    "waveTime",
    "degToRad",
    "radToDeg",
    "server",
    "ctrlProcessor",
    "ctrlPlayer",
    "ctrlCommand",
    "this",
    "thisx",
    "thisy",
    "links",
    "ipt",
    "unit",
    "mapw",
    "maph",
    "blockCount",
    "unitCount",
    "itemCount",
    "liquidCount",
];

const TEAMS: &[&str] = &["derelict", "sharded", "crux", "malis", "green", "blue"];

/// Sensable properties, usable as member-access names.
const PROPERTIES: &[&str] = &[
    "totalItems",
    "firstItem",
    "totalLiquids",
    "totalPower",
    "itemCapacity",
    "liquidCapacity",
    "powerCapacity",
    "powerNetStored",
    "powerNetCapacity",
    "powerNetIn",
    "powerNetOut",
    "ammo",
    "ammoCapacity",
    "health",
    "maxHealth",
    "heat",
    "efficiency",
    "progress",
    "timescale",
    "rotation",
    "x",
    "y",
    "shootX",
    "shootY",
    "size",
    "dead",
    "range",
    "shooting",
    "boosting",
    "mineX",
    "mineY",
    "mining",
    "speed",
    "team",
    "type",
    "flag",
    "controlled",
    "controller",
    "name",
    "payloadCount",
    "payloadType",
    "enabled",
    "config",
    "color",
];

const ITEMS: &[&str] = &[
    "copper",
    "lead",
    "metaglass",
    "graphite",
    "sand",
    "coal",
    "titanium",
    "thorium",
    "scrap",
    "silicon",
    "plastanium",
    "phase_fabric",
    "surge_alloy",
    "spore_pod",
    "blast_compound",
    "pyratite",
    "beryllium",
    "tungsten",
    "oxide",
    "carbide",
    "fissile_matter",
    "dormant_cyst",
];

const LIQUIDS: &[&str] = &[
    "water",
    "slag",
    "oil",
    "cryofluid",
    "neoplasm",
    "arkycite",
    "gallium",
    "ozone",
    "hydrogen",
    "nitrogen",
    "cyanogen",
];

const UNITS: &[&str] = &[
    "dagger",
    "mace",
    "fortress",
    "scepter",
    "reign",
    "nova",
    "pulsar",
    "quasar",
    "vela",
    "corvus",
    "crawler",
    "atrax",
    "spiroct",
    "arkyid",
    "toxopid",
    "flare",
    "horizon",
    "zenith",
    "antumbra",
    "eclipse",
    "mono",
    "poly",
    "mega",
    "quad",
    "oct",
    "risso",
    "minke",
    "bryde",
    "sei",
    "omura",
    "retusa",
    "oxynoe",
    "cyerce",
    "aegires",
    "navanax",
    "alpha",
    "beta",
    "gamma",
    "stell",
    "locus",
    "precept",
    "vanquish",
    "conquer",
    "merui",
    "cleroi",
    "anthicus",
    "tecta",
    "collaris",
    "elude",
    "avert",
    "obviate",
    "quell",
    "disrupt",
    "evoke",
    "incite",
    "emanate",
];

const BLOCKS: &[&str] = &[
    // Turrets
    "duo",
    "scatter",
    "scorch",
    "hail",
    "wave",
    "lancer",
    "arc",
    "parallax",
    "swarmer",
    "salvo",
    "segment",
    "tsunami",
    "fuse",
    "ripple",
    "cyclone",
    "foreshadow",
    "spectre",
    "meltdown",
    // Production
    "graphite_press",
    "multi_press",
    "silicon_smelter",
    "silicon_crucible",
    "kiln",
    "plastanium_compressor",
    "phase_weaver",
    "surge_smelter",
    "cryofluid_mixer",
    "pyratite_mixer",
    "blast_mixer",
    "melter",
    "separator",
    "disassembler",
    "spore_press",
    "pulverizer",
    "coal_centrifuge",
    "incinerator",
    // Drills and harvesters
    "mechanical_drill",
    "pneumatic_drill",
    "laser_drill",
    "blast_drill",
    "water_extractor",
    "cultivator",
    "oil_extractor",
    // Distribution
    "conveyor",
    "titanium_conveyor",
    "plastanium_conveyor",
    "armored_conveyor",
    "junction",
    "bridge_conveyor",
    "phase_conveyor",
    "sorter",
    "inverted_sorter",
    "router",
    "distributor",
    "overflow_gate",
    "underflow_gate",
    "mass_driver",
    "payload_conveyor",
    "payload_router",
    // Liquid transport
    "mechanical_pump",
    "rotary_pump",
    "thermal_pump",
    "conduit",
    "pulse_conduit",
    "plated_conduit",
    "liquid_router",
    "liquid_container",
    "liquid_tank",
    "liquid_junction",
    "bridge_conduit",
    "phase_conduit",
    // Power
    "combustion_generator",
    "thermal_generator",
    "steam_generator",
    "differential_generator",
    "rtg_generator",
    "solar_panel",
    "large_solar_panel",
    "thorium_reactor",
    "impact_reactor",
    "battery",
    "battery_large",
    "power_node",
    "power_node_large",
    "surge_tower",
    "diode",
    // Walls
    "copper_wall",
    "copper_wall_large",
    "titanium_wall",
    "titanium_wall_large",
    "plastanium_wall",
    "plastanium_wall_large",
    "thorium_wall",
    "thorium_wall_large",
    "phase_wall",
    "phase_wall_large",
    "surge_wall",
    "surge_wall_large",
    "door",
    "door_large",
    "scrap_wall",
    "scrap_wall_large",
    "scrap_wall_huge",
    "scrap_wall_gigantic",
    // Defense and support
    "mender",
    "mend_projector",
    "overdrive_projector",
    "overdrive_dome",
    "force_projector",
    "shock_mine",
    // Storage
    "core_shard",
    "core_foundation",
    "core_nucleus",
    "container",
    "vault",
    "unloader",
    // Unit production
    "ground_factory",
    "air_factory",
    "naval_factory",
    "additive_reconstructor",
    "multiplicative_reconstructor",
    "exponential_reconstructor",
    "tetrative_reconstructor",
    "repair_point",
    "repair_turret",
    "resupply_point",
    // Campaign and misc
    "launch_pad",
    "interplanetary_accelerator",
    "thruster",
    // Logic and displays
    "message",
    "switch",
    "micro_processor",
    "logic_processor",
    "hyper_processor",
    "memory_cell",
    "memory_bank",
    "logic_display",
    "large_logic_display",
    "canvas",
    // Erekir production chain
    "silicon_arc_furnace",
    "electrolyzer",
    "atmospheric_concentrator",
    "oxidation_chamber",
    "electric_heater",
    "slag_heater",
    "phase_heater",
    "heat_redirector",
    "heat_router",
    "slag_incinerator",
    "carbide_crucible",
    "surge_crucible",
    "cyanogen_synthesizer",
    "phase_synthesizer",
    "heat_reactor",
    // Erekir drills and walls
    "cliff_crusher",
    "plasma_bore",
    "large_plasma_bore",
    "impact_drill",
    "eruption_drill",
    "beryllium_wall",
    "beryllium_wall_large",
    "tungsten_wall",
    "tungsten_wall_large",
    "carbide_wall",
    "carbide_wall_large",
    "reinforced_surge_wall",
    "reinforced_surge_wall_large",
    "blast_door",
    "shielded_wall",
    // Erekir turrets
    "breach",
    "diffuse",
    "sublimate",
    "titan",
    "disperse",
    "afflict",
    "lustre",
    "scathe",
    "smite",
    "malign",
    // Erekir distribution and power
    "duct",
    "armored_duct",
    "duct_router",
    "duct_bridge",
    "overflow_duct",
    "underflow_duct",
    "duct_unloader",
    "surge_conveyor",
    "surge_router",
    "unit_cargo_loader",
    "unit_cargo_unload_point",
    "reinforced_conduit",
    "reinforced_liquid_junction",
    "reinforced_bridge_conduit",
    "reinforced_liquid_router",
    "reinforced_liquid_container",
    "reinforced_liquid_tank",
    "reinforced_pump",
    "turbine_condenser",
    "chemical_combustion_chamber",
    "pyrolysis_generator",
    "flux_reactor",
    "neoplasia_reactor",
    "beam_node",
    "beam_tower",
    "regen_projector",
    "build_tower",
    "shockwave_tower",
    // Erekir cores and factories
    "core_bastion",
    "core_citadel",
    "core_acropolis",
    "reinforced_container",
    "reinforced_vault",
    "tank_fabricator",
    "ship_fabricator",
    "mech_fabricator",
    "tank_refabricator",
    "ship_refabricator",
    "mech_refabricator",
    "prime_refabricator",
    "tank_assembler",
    "ship_assembler",
    "mech_assembler",
    "basic_assembler_module",
    "payload_mass_driver",
    "large_payload_mass_driver",
    "payload_loader",
    "payload_unloader",
    "constructor",
    "large_constructor",
    "deconstructor",
    "radar",
];

/// Floors and ores, as `lookup`/`ulocate` and sensor reads surface them.
const FLOORS: &[&str] = &[
    "ore_copper",
    "ore_lead",
    "ore_coal",
    "ore_titanium",
    "ore_thorium",
    "ore_scrap",
    "ore_beryllium",
    "ore_tungsten",
    "ore_crystal_thorium",
    "ore_wall_thorium",
    "ore_wall_beryllium",
    "ore_wall_tungsten",
    "deep_water",
    "shallow_water",
    "tainted_water",
    "deep_tainted_water",
    "darksand_tainted_water",
    "sand_water",
    "darksand_water",
    "tar",
    "pooled_cryofluid",
    "molten_slag",
    "space",
    "empty",
    "stone",
    "crater_stone",
    "char",
    "basalt",
    "hotrock",
    "magmarock",
    "sand_floor",
    "darksand",
    "dirt",
    "mud",
    "dacite",
    "rhyolite",
    "rhyolite_crater",
    "rough_rhyolite",
    "regolith",
    "yellow_stone",
    "carbon_stone",
    "ferric_stone",
    "ferric_craters",
    "beryllic_stone",
    "crystalline_stone",
    "crystal_floor",
    "yellow_stone_plates",
    "red_stone",
    "dense_red_stone",
    "red_ice",
    "arkycite_floor",
    "arkyic_stone",
    "grass",
    "salt",
    "snow",
    "ice",
    "ice_snow",
    "shale",
    "moss",
    "core_zone",
    "spore_moss",
    "metal_floor",
    "metal_floor_damaged",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_constants_are_present() {
        let catalog = catalog();
        assert_eq!(catalog.constant("true"), Some(&Known::True));
        assert_eq!(catalog.constant("false"), Some(&Known::False));
        assert_eq!(catalog.constant("null"), Some(&Known::Null));
    }

    #[test]
    fn dashes_are_restored_on_emission() {
        let catalog = catalog();
        assert_eq!(
            catalog.constant("phase_fabric"),
            Some(&Known::Builtin("@phase-fabric".to_string()))
        );
        assert_eq!(
            catalog.constant("waveNumber"),
            Some(&Known::Builtin("@waveNumber".to_string()))
        );
    }

    #[test]
    fn radar_family_counts() {
        let catalog = catalog();
        let radar = catalog
            .procedures
            .keys()
            .filter(|name| name.starts_with("radar_"))
            .count();
        let uradar = catalog
            .procedures
            .keys()
            .filter(|name| name.starts_with("uradar_"))
            .count();
        // 1 + 7 + 21 + 35 ordered filter selections, times five metrics.
        assert_eq!(radar, 320);
        assert_eq!(uradar, 320);
    }

    #[test]
    fn radar_slots_pad_with_any() {
        let catalog = catalog();
        let procedure = catalog.procedure("radar_enemy_flying_distance").unwrap();
        assert_eq!(
            procedure.opening,
            vec!["radar", "enemy", "flying", "any", "distance"]
        );
        assert_eq!(procedure.parameters, 3);

        let unqualified = catalog.procedure("radar_distance").unwrap();
        assert_eq!(unqualified.opening, vec!["radar", "any", "any", "any", "distance"]);
    }

    #[test]
    fn filters_stay_in_slot_order() {
        let catalog = catalog();
        // `flying` has a higher slot index than `enemy`, so the reversed name
        // is never generated.
        assert!(catalog.procedure("radar_flying_enemy_distance").is_none());
        assert!(catalog.procedure("radar_enemy_flying_distance").is_some());
    }

    #[test]
    fn uradar_has_no_building_parameter() {
        let catalog = catalog();
        let procedure = catalog.procedure("uradar_enemy_health").unwrap();
        assert_eq!(procedure.parameters, 2);
        assert_eq!(
            procedure.opening,
            vec!["uradar", "enemy", "any", "any", "health", "0"]
        );
    }

    #[test]
    fn ulocate_building_injects_the_ore_dummy() {
        let catalog = catalog();
        let procedure = catalog.procedure("ulocate_building_core").unwrap();
        assert_eq!(procedure.parameters, 5);
        let dummy = procedure.dummy.unwrap();
        assert_eq!(dummy.after, 0);
        assert_eq!(dummy.word, "@copper");
    }

    #[test]
    fn draw_and_control_pad_to_full_width() {
        let catalog = catalog();
        assert_eq!(catalog.procedure("draw_clear").unwrap().padding, 3);
        assert_eq!(catalog.procedure("draw_triangle").unwrap().padding, 0);
        assert_eq!(catalog.procedure("control_enabled").unwrap().padding, 3);
        assert_eq!(catalog.procedure("ucontrol_move").unwrap().padding, 3);
    }

    #[test]
    fn unary_operations_pad_one_slot() {
        let catalog = catalog();
        let sqrt = catalog.procedure("op_sqrt").unwrap();
        assert_eq!(sqrt.parameters, 2);
        assert_eq!(sqrt.padding, 1);
        let max = catalog.procedure("op_max").unwrap();
        assert_eq!(max.parameters, 3);
        assert_eq!(max.padding, 0);
    }

    #[test]
    fn punctuation_operators_are_not_procedures() {
        let catalog = catalog();
        assert!(catalog.procedure("op_add").is_none());
        assert!(catalog.procedure("op_shl").is_none());
    }

    #[test]
    fn content_tables_are_substantial() {
        let catalog = catalog();
        // §6 promises roughly four hundred content names.
        assert!(catalog.constants.len() > 400, "{}", catalog.constants.len());
    }
}
