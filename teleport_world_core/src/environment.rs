use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    Direction, ObjectType, Position,
    map::{GridError, ObjectGrid},
    object::{Toggle, ToggleContext, WorldObject},
    palette::Color,
    render::Bitmap,
};

/// Layout of the 5×5 teleporter room used by the manual-control demo.
pub const TELEPORT_5X5: &str = "
WA WA WA WA WA
WA ST BL TP WA
WA BL WA BL WA
WA TX BL GO WA
WA WA WA WA WA
";

/// Actions the agent can take in a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Left,
    Right,
    Forward,
    Pickup,
    Drop,
    Toggle,
    Done,
}

/// Why an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    ReachedGoal,
    EnteredLava,
}

/// Represents the outcome of processing an agent's action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult {
    Success,
    Failure(String),
    Terminated(Termination),
}

/// Errors raised while parsing a map string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("Map string is empty.")]
    Empty,
    #[error("Inconsistent width at row {row}: expected {expected}, found {found}")]
    InconsistentWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Unknown map code '{code}' at position ({x}, {y}).")]
    UnknownCode { code: String, x: usize, y: usize },
    #[error("Multiple start positions ('ST') found.")]
    MultipleStarts,
    #[error("No start position ('ST') found in map.")]
    NoStart,
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Owns the grid, the agent and everything it carries.
#[derive(Debug, Clone)]
pub struct Environment {
    layout: ObjectGrid,
    grid: ObjectGrid,
    start: Position,
    agent_pos: Position,
    agent_dir: Direction,
    carrying: Option<WorldObject>,
    step_count: u64,
    rng: StdRng,
}

impl Environment {
    /// Creates an environment from a layout and the agent's start cell, reset with seed `0`.
    pub fn new(layout: ObjectGrid, start: Position) -> Self {
        let mut environment = Environment {
            grid: layout.clone(),
            layout,
            start,
            agent_pos: start,
            agent_dir: Direction::Right,
            carrying: None,
            step_count: 0,
            rng: StdRng::seed_from_u64(0),
        };
        environment.reset(0);
        environment
    }

    /// Restores the original layout and places the agent at the start cell.
    ///
    /// The starting direction is drawn from `seed`, so equal seeds give equal episodes.
    pub fn reset(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
        self.grid = self.layout.clone();
        self.carrying = None;
        self.step_count = 0;
        self.agent_pos = self.start;
        self.agent_dir = Direction::from_index(self.rng.random_range(0..4));
        debug!(seed, pos = ?self.agent_pos, dir = ?self.agent_dir, "environment reset");
    }

    pub fn grid(&self) -> &ObjectGrid {
        &self.grid
    }

    pub fn agent_pos(&self) -> Position {
        self.agent_pos
    }

    pub fn agent_dir(&self) -> Direction {
        self.agent_dir
    }

    pub fn carrying(&self) -> Option<&WorldObject> {
        self.carrying.as_ref()
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// The cell directly in front of the agent.
    pub fn front_pos(&self) -> Option<Position> {
        self.agent_pos
            .step(self.agent_dir)
            .filter(|pos| self.grid.is_valid(*pos))
    }

    /// Toggles the object at `pos`, reporting whether anything happened.
    pub fn toggle(&mut self, pos: Position) -> bool {
        let Some(cell) = self.grid.get_mut(pos) else {
            return false;
        };
        let Some(obj) = cell.as_mut() else {
            return false;
        };
        let ctx = ToggleContext {
            carrying: self.carrying.as_ref(),
        };
        match obj.toggle(ctx, pos) {
            Toggle::Unchanged => false,
            Toggle::Changed => true,
            Toggle::Replace(next) => {
                *cell = next;
                true
            }
        }
    }

    /// Switches the teleporter at `pos` on or off. Returns `false` if there is none.
    pub fn set_teleporter_active(&mut self, pos: Position, active: bool) -> bool {
        match self
            .grid
            .get_mut(pos)
            .and_then(Option::as_mut)
            .and_then(WorldObject::as_teleporter_mut)
        {
            Some(t) => {
                t.set_active(active);
                true
            }
            None => false,
        }
    }

    /// Positions of every teleporter on the grid, in row-major order.
    pub fn teleporters(&self) -> Vec<Position> {
        self.grid
            .enumerate()
            .filter_map(|(pos, cell)| {
                cell.as_ref()
                    .filter(|obj| obj.object_type() == ObjectType::Teleporter)
                    .map(|_| pos)
            })
            .collect()
    }

    /// Processes a single action.
    pub fn step(&mut self, action: Action) -> ActionResult {
        self.step_count += 1;
        let result = self.apply(action);
        debug!(?action, ?result, step = self.step_count, "step");
        result
    }

    fn apply(&mut self, action: Action) -> ActionResult {
        match action {
            Action::Left => {
                self.agent_dir = self.agent_dir.turn_left();
                ActionResult::Success
            }
            Action::Right => {
                self.agent_dir = self.agent_dir.turn_right();
                ActionResult::Success
            }
            Action::Done => ActionResult::Success,
            Action::Forward => {
                let Some(target) = self.front_pos() else {
                    return ActionResult::Failure("Target position is out of bounds.".to_string());
                };
                match self.grid.object_at(target) {
                    Some(obj) if !obj.can_overlap() => {
                        ActionResult::Failure(format!("Cannot move into a {}.", obj.object_type()))
                    }
                    cell => {
                        let termination = cell.and_then(|obj| match obj.object_type() {
                            ObjectType::Goal => Some(Termination::ReachedGoal),
                            ObjectType::Lava => Some(Termination::EnteredLava),
                            _ => None,
                        });
                        self.agent_pos = target;
                        termination.map_or(ActionResult::Success, ActionResult::Terminated)
                    }
                }
            }
            Action::Pickup => {
                let Some(target) = self.front_pos() else {
                    return ActionResult::Failure("Nothing to pick up.".to_string());
                };
                if self.carrying.is_some() {
                    return ActionResult::Failure("Already carrying an object.".to_string());
                }
                match self.grid.object_at(target) {
                    Some(obj) if obj.can_pickup() => {
                        let mut obj = self.grid.take(target);
                        if let Some(held) = obj.as_mut() {
                            held.cur_pos = None;
                        }
                        self.carrying = obj;
                        ActionResult::Success
                    }
                    _ => ActionResult::Failure("Nothing to pick up.".to_string()),
                }
            }
            Action::Drop => {
                let Some(target) = self.front_pos() else {
                    return ActionResult::Failure("Cannot drop here.".to_string());
                };
                if self.grid.object_at(target).is_some() {
                    return ActionResult::Failure("Target cell is occupied.".to_string());
                }
                match self.carrying.take() {
                    Some(mut obj) => {
                        obj.cur_pos = Some(target);
                        self.grid[target] = Some(obj);
                        ActionResult::Success
                    }
                    None => ActionResult::Failure("Not carrying anything.".to_string()),
                }
            }
            Action::Toggle => {
                let toggled = self.front_pos().is_some_and(|target| self.toggle(target));
                if toggled {
                    ActionResult::Success
                } else {
                    ActionResult::Failure("Nothing to toggle.".to_string())
                }
            }
        }
    }

    /// Renders the full grid with the agent.
    pub fn render(&self, tile_size: usize) -> Bitmap {
        self.grid
            .render(tile_size, Some((self.agent_pos, self.agent_dir)))
    }
}

/// The 5×5 teleporter room.
pub fn teleport_5x5() -> Environment {
    load_environment_from_string(TELEPORT_5X5).expect("built-in map is valid")
}

fn color_code(c: char) -> Option<Color> {
    match c {
        'R' => Some(Color::Red),
        'G' => Some(Color::Green),
        'B' => Some(Color::Blue),
        'P' => Some(Color::Purple),
        'Y' => Some(Color::Yellow),
        'E' => Some(Color::Grey),
        _ => None,
    }
}

/// Parses a single map token into the object it places, if any.
fn parse_code(code: &str) -> Option<Option<WorldObject>> {
    let obj = match code {
        "BL" | "ST" => None,
        "WA" | "WL" => Some(WorldObject::wall(Color::Grey)),
        "GO" => Some(WorldObject::goal()),
        "LA" => Some(WorldObject::lava()),
        "TP" => Some(WorldObject::teleporter(true, Color::Blue, Color::Grey)),
        "TX" => Some(WorldObject::teleporter(false, Color::Blue, Color::Grey)),
        _ => {
            let mut chars = code.chars();
            let (kind, color) = (chars.next()?, color_code(chars.next()?)?);
            if chars.next().is_some() {
                return None;
            }
            Some(match kind {
                'F' => WorldObject::floor(color),
                'D' => WorldObject::door(color, false, false),
                'L' => WorldObject::door(color, false, true),
                'K' => WorldObject::key(color),
                'B' => WorldObject::ball(color),
                'X' => WorldObject::boxed(color, None),
                _ => return None,
            })
        }
    };
    Some(obj)
}

/// Loads an environment from a whitespace-separated grid of two-letter codes.
///
/// `WA` wall, `BL` blank, `ST` start, `GO` goal, `LA` lava, `TP`/`TX` active and
/// inactive teleporter. Colored objects are a kind letter followed by a color
/// letter: `F` floor, `D` door, `L` locked door, `K` key, `B` ball, `X` box;
/// colors are `R G B P Y` and `E` for grey.
pub fn load_environment_from_string(map_string: &str) -> Result<Environment, MapError> {
    let rows: Vec<Vec<&str>> = map_string
        .trim()
        .lines()
        .map(|line| line.split_whitespace().collect())
        .collect();

    let width = rows.first().map_or(0, Vec::len);
    if width == 0 {
        return Err(MapError::Empty);
    }
    if let Some((row, tokens)) = rows.iter().enumerate().find(|(_, t)| t.len() != width) {
        return Err(MapError::InconsistentWidth {
            row,
            expected: width,
            found: tokens.len(),
        });
    }

    let mut layout = ObjectGrid::new(width, rows.len());
    let mut start = None;

    for (y, tokens) in rows.iter().enumerate() {
        for (x, code) in tokens.iter().enumerate() {
            let pos = Position { x, y };
            if *code == "ST" {
                if start.is_some() {
                    return Err(MapError::MultipleStarts);
                }
                start = Some(pos);
            }
            let obj = parse_code(code).ok_or_else(|| MapError::UnknownCode {
                code: code.to_string(),
                x,
                y,
            })?;
            if let Some(obj) = obj {
                layout.place(pos, obj)?;
            }
        }
    }

    let start = start.ok_or(MapError::NoStart)?;

    let open_border = layout.enumerate().any(|(pos, cell)| {
        let on_edge =
            pos.x == 0 || pos.y == 0 || pos.x + 1 == layout.width() || pos.y + 1 == layout.height();
        on_edge && cell.as_ref().map(WorldObject::object_type) != Some(ObjectType::Wall)
    });
    if open_border {
        warn!("map border is not fully walled");
    }

    Ok(Environment::new(layout, start))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(env: &mut Environment, dir: Direction) {
        while env.agent_dir() != dir {
            env.step(Action::Right);
        }
    }

    #[test]
    fn preset_layout() {
        let env = teleport_5x5();
        assert_eq!(env.grid().width(), 5);
        assert_eq!(env.grid().height(), 5);
        assert_eq!(env.agent_pos(), Position::new(1, 1));
        assert_eq!(
            env.teleporters(),
            vec![Position::new(3, 1), Position::new(1, 3)]
        );

        let active = env.grid().object_at(Position::new(3, 1)).unwrap();
        assert_eq!(active.color(), Color::Blue);
        let inactive = env.grid().object_at(Position::new(1, 3)).unwrap();
        assert_eq!(inactive.color(), Color::Grey);
    }

    #[test]
    fn reset_is_deterministic_per_seed() {
        let mut env = teleport_5x5();
        env.reset(42);
        let first = env.agent_dir();
        env.step(Action::Left);
        env.reset(42);
        assert_eq!(env.agent_dir(), first);
        assert_eq!(env.step_count(), 0);
    }

    #[test]
    fn teleporter_blocks_movement() {
        let mut env = teleport_5x5();
        face(&mut env, Direction::Right);
        assert_eq!(env.step(Action::Forward), ActionResult::Success);
        assert_eq!(env.agent_pos(), Position::new(2, 1));

        let result = env.step(Action::Forward);
        assert_eq!(
            result,
            ActionResult::Failure("Cannot move into a teleporter.".to_string())
        );
        assert_eq!(env.agent_pos(), Position::new(2, 1));
        assert!(!env.toggle(Position::new(3, 1)));
    }

    #[test]
    fn flipping_a_teleporter_changes_its_color() {
        let mut env = teleport_5x5();
        let pos = Position::new(1, 3);
        assert!(env.set_teleporter_active(pos, true));
        assert_eq!(env.grid().object_at(pos).unwrap().color(), Color::Blue);
        assert!(!env.set_teleporter_active(Position::new(2, 2), true));

        env.reset(0);
        assert_eq!(env.grid().object_at(pos).unwrap().color(), Color::Grey);
    }

    #[test]
    fn reaching_the_goal_terminates() {
        let mut env =
            load_environment_from_string("WA WA WA WA\nWA ST GO WA\nWA WA WA WA").unwrap();
        face(&mut env, Direction::Right);
        assert_eq!(
            env.step(Action::Forward),
            ActionResult::Terminated(Termination::ReachedGoal)
        );
        assert_eq!(env.agent_pos(), Position::new(2, 1));
    }

    #[test]
    fn key_unlocks_matching_door() {
        let mut env =
            load_environment_from_string("WA WA WA WA WA WA\nWA ST KY LY LA WA\nWA WA WA WA WA WA")
                .unwrap();
        face(&mut env, Direction::Right);

        assert_eq!(env.step(Action::Pickup), ActionResult::Success);
        let held = env.carrying().unwrap();
        assert_eq!(held.object_type(), ObjectType::Key);
        assert_eq!(held.cur_pos, None);
        assert_eq!(held.init_pos, Some(Position::new(2, 1)));

        assert_eq!(env.step(Action::Forward), ActionResult::Success);
        assert!(matches!(env.step(Action::Forward), ActionResult::Failure(_)));
        assert_eq!(env.step(Action::Toggle), ActionResult::Success);
        assert_eq!(env.step(Action::Forward), ActionResult::Success);
        assert_eq!(
            env.step(Action::Forward),
            ActionResult::Terminated(Termination::EnteredLava)
        );
    }

    #[test]
    fn drop_places_the_carried_object() {
        let mut env =
            load_environment_from_string("WA WA WA WA\nWA ST BR WA\nWA BL BL WA\nWA WA WA WA")
                .unwrap();
        face(&mut env, Direction::Right);
        assert_eq!(env.step(Action::Pickup), ActionResult::Success);
        assert!(matches!(env.step(Action::Pickup), ActionResult::Failure(_)));

        face(&mut env, Direction::Down);
        assert_eq!(env.step(Action::Drop), ActionResult::Success);
        let ball = env.grid().object_at(Position::new(1, 2)).unwrap();
        assert_eq!(ball.color(), Color::Red);
        assert_eq!(ball.cur_pos, Some(Position::new(1, 2)));
        assert!(env.carrying().is_none());
    }

    #[test]
    fn toggling_a_box_reveals_nothing_when_empty() {
        let mut env =
            load_environment_from_string("WA WA WA WA\nWA ST XG WA\nWA WA WA WA").unwrap();
        face(&mut env, Direction::Right);
        assert_eq!(env.step(Action::Toggle), ActionResult::Success);
        assert!(env.grid().object_at(Position::new(2, 1)).is_none());
    }

    #[test]
    fn render_covers_the_grid() {
        let env = teleport_5x5();
        let frame = env.render(16);
        assert_eq!(frame.width(), 80);
        assert_eq!(frame.height(), 80);
        // Centre of the active teleporter tile is painted in its color.
        assert_eq!(frame.pixel(3 * 16 + 8, 16 + 8), Some(Color::Blue.rgb()));
    }

    #[test]
    fn bad_maps_are_rejected() {
        assert_eq!(load_environment_from_string("   ").unwrap_err(), MapError::Empty);
        assert_eq!(
            load_environment_from_string("ST BL\nBL").unwrap_err(),
            MapError::InconsistentWidth {
                row: 1,
                expected: 2,
                found: 1
            }
        );
        assert_eq!(
            load_environment_from_string("ST QQ").unwrap_err(),
            MapError::UnknownCode {
                code: "QQ".to_string(),
                x: 1,
                y: 0
            }
        );
        assert_eq!(
            load_environment_from_string("ST ST").unwrap_err(),
            MapError::MultipleStarts
        );
        assert_eq!(
            load_environment_from_string("BL BL").unwrap_err(),
            MapError::NoStart
        );
    }
}
