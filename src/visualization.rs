//! 3D replay of a solve using kiss3d.

use kiss3d::prelude::*;

use upgrade_solver::grid::Cell;
use upgrade_solver::upgrades::Upgrade;
use upgrade_solver::{SolveOutcome, Workbench};

/// Frames kept for replay; the final board is always kept on top of these.
const MAX_FRAMES: usize = 5000;

/// Who holds an occupied tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Occupant {
    /// Position of the upgrade in the selection.
    Selected(usize),
    /// An upgrade outside the selection, e.g. one left equipped on another carrier.
    Unknown,
}

/// State of one grid cell in a recorded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tile {
    x: i32,
    y: i32,
    enabled: bool,
    occupant: Option<Occupant>,
}

/// The board as it stood after one scheduler frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardFrame {
    frame: u64,
    width: usize,
    height: usize,
    tiles: Vec<Tile>,
}

impl BoardFrame {
    /// Snapshots the workbench grid.
    pub fn capture(bench: &Workbench, selection: &[Upgrade], frame: u64) -> Self {
        let grid = bench.grid();
        let tiles = grid
            .cells()
            .map(|&Cell { x, y, enabled, occupant }| Tile {
                x,
                y,
                enabled,
                occupant: occupant.map(|id| {
                    selection
                        .iter()
                        .position(|u| u.id() == id)
                        .map_or(Occupant::Unknown, Occupant::Selected)
                }),
            })
            .collect();
        Self {
            frame,
            width: grid.width(),
            height: grid.height(),
            tiles,
        }
    }

    /// Appends a snapshot unless the replay buffer is full.
    pub fn record(frames: &mut Vec<Self>, bench: &Workbench, selection: &[Upgrade], frame: u64) {
        if frames.len() < MAX_FRAMES {
            frames.push(Self::capture(bench, selection, frame));
        }
    }

    /// Makes sure the last frame shows the final board.
    pub fn finish(frames: &mut Vec<Self>, bench: &Workbench, selection: &[Upgrade], frame: u64) {
        let last = Self::capture(bench, selection, frame);
        if frames.last().map_or(true, |f| f.tiles != last.tiles) {
            frames.push(last);
        }
    }

    fn placed(&self) -> usize {
        let mut seen: Vec<usize> = self
            .tiles
            .iter()
            .filter_map(|t| match t.occupant {
                Some(Occupant::Selected(index)) => Some(index),
                _ => None,
            })
            .collect();
        seen.sort_unstable();
        seen.dedup();
        seen.len()
    }
}

/// Returns the display color for an upgrade's position in the selection.
///
/// The mapping is stable to keep colors consistent across frames.
fn upgrade_color(index: usize) -> Color {
    match index % 7 {
        0 => Color::new(1.0, 0.2, 0.2, 1.0), // red
        1 => Color::new(0.2, 1.0, 0.2, 1.0), // green
        2 => Color::new(0.2, 0.2, 1.0, 1.0), // blue
        3 => Color::new(1.0, 1.0, 0.2, 1.0), // yellow
        4 => Color::new(1.0, 0.2, 1.0, 1.0), // magenta
        5 => Color::new(0.2, 1.0, 1.0, 1.0), // cyan
        _ => Color::new(1.0, 0.6, 0.2, 1.0), // orange
    }
}

/// Represents a rendered tile in the 3D scene.
struct RenderedTile {
    node: SceneNode3d,
    base_position: Vec3,
    /// Occupied tiles move with the lift control.
    occupied: bool,
}

/// Builds the 3D scene for a frame.
///
/// Coordinate conventions:
/// - Columns map to X, rows to -Y (row 0 on top).
/// - Odd columns sit half a cell lower, matching the odd-q layout.
/// - The board is centered at the origin.
fn build_scene(scene: &mut SceneNode3d, board: &BoardFrame) -> Vec<RenderedTile> {
    /// Size of each rendered tile (slightly smaller than a cell for visible gaps).
    const TILE_SIZE: f32 = 0.8;
    const TILE_DEPTH: f32 = 0.2;
    /// Horizontal distance between hex column centers.
    const COLUMN_SPACING: f32 = 0.87;

    let center = Vec3::new(
        (board.width as f32 - 1.0) * COLUMN_SPACING / 2.0,
        -(board.height as f32 - 0.5) / 2.0,
        0.0,
    );

    let mut rendered = Vec::with_capacity(board.tiles.len());
    for tile in board.tiles.iter().filter(|t| t.enabled) {
        let column_shift = if tile.x & 1 == 1 { 0.5 } else { 0.0 };
        let base_position = Vec3::new(
            tile.x as f32 * COLUMN_SPACING,
            -(tile.y as f32 + column_shift),
            0.0,
        ) - center;
        let color = match tile.occupant {
            Some(Occupant::Selected(index)) => upgrade_color(index),
            Some(Occupant::Unknown) => Color::new(0.95, 0.95, 0.95, 1.0),
            None => Color::new(0.35, 0.35, 0.35, 1.0),
        };
        let node = scene
            .add_cube(TILE_SIZE, TILE_SIZE, TILE_DEPTH)
            .set_color(color)
            .set_position(base_position);
        rendered.push(RenderedTile {
            node,
            base_position,
            occupied: tile.occupant.is_some(),
        });
    }
    rendered
}

fn window_title(board: &BoardFrame, index: usize, total: usize, outcome: SolveOutcome) -> String {
    format!(
        "Frame {}/{} (step {}, {} placed, {}) - [Left/Right] step, [Up/Down] lift, [R] reset",
        index + 1,
        total,
        board.frame,
        board.placed(),
        outcome
    )
}

/// Replays recorded frames in an interactive 3D viewer.
pub fn display(frames: Vec<BoardFrame>, outcome: SolveOutcome) {
    pollster::block_on(display_async(frames, outcome));
}

async fn display_async(frames: Vec<BoardFrame>, outcome: SolveOutcome) {
    if frames.is_empty() {
        println!("No frames to display");
        return;
    }

    let num_frames = frames.len();
    // start on the final board
    let mut current = num_frames - 1;

    let mut window =
        Window::new(&window_title(&frames[current], current, num_frames, outcome)).await;

    let mut camera = OrbitCamera3d::default();
    camera.set_dist(10.0);

    let mut scene = SceneNode3d::empty();
    scene
        .add_light(Light::point(100.0))
        .set_position(Vec3::new(5.0, 5.0, 8.0));

    let mut rendered = build_scene(&mut scene, &frames[current]);

    let mut lift: f32 = 0.0;
    const LIFT_SPEED: f32 = 0.05;
    let mut needs_rebuild = false;

    loop {
        for event in window.events().iter() {
            if let kiss3d::event::WindowEvent::Key(key, action, _) = event.value {
                use kiss3d::event::{Action, Key};
                if action == Action::Press {
                    match key {
                        Key::Up => lift += LIFT_SPEED,
                        Key::Down => lift = (lift - LIFT_SPEED).max(0.0),
                        Key::R => lift = 0.0,
                        Key::Right => {
                            current = (current + 1) % num_frames;
                            needs_rebuild = true;
                        }
                        Key::Left => {
                            current = current.checked_sub(1).unwrap_or(num_frames - 1);
                            needs_rebuild = true;
                        }
                        _ => {}
                    }
                }
            }
        }

        if needs_rebuild {
            for mut tile in rendered.drain(..) {
                tile.node.remove();
            }
            rendered = build_scene(&mut scene, &frames[current]);
            window.set_title(&window_title(&frames[current], current, num_frames, outcome));
            needs_rebuild = false;
        }

        for tile in &mut rendered {
            if tile.occupied {
                tile.node
                    .set_position(tile.base_position + Vec3::Z * lift * 4.0);
            }
        }

        if !window.render_3d(&mut scene, &mut camera).await {
            break;
        }
    }
}
