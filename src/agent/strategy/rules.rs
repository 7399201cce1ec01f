//! Ban and try rules, the board attributes they test, and the full set of
//! rule variations a strategy search draws from.
//!
//! Most rules compare an attribute of the board before and after shifting
//! it in the rule's direction: a ban fires when the move would destroy
//! something good, a try fires when the move would create it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::{Board, Direction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Left,
    MiddleLeft,
    MiddleRight,
    Right,
}

impl Column {
    pub const ALL: [Column; 4] = [Column::Left, Column::MiddleLeft, Column::MiddleRight, Column::Right];

    pub(crate) fn cells(self) -> [usize; 4] { column_cells(self as usize) }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Column::Left => "left",
            Column::MiddleLeft => "middle left",
            Column::MiddleRight => "middle right",
            Column::Right => "right",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Row {
    Top,
    MiddleTop,
    MiddleBottom,
    Bottom,
}

impl Row {
    pub const ALL: [Row; 4] = [Row::Top, Row::MiddleTop, Row::MiddleBottom, Row::Bottom];

    pub(crate) fn cells(self) -> [usize; 4] { row_cells(self as usize) }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Row::Top => "top",
            Row::MiddleTop => "middle top",
            Row::MiddleBottom => "middle bottom",
            Row::Bottom => "bottom",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    fn cell(self) -> usize {
        match self {
            Corner::TopLeft => 0,
            Corner::TopRight => 3,
            Corner::BottomLeft => 12,
            Corner::BottomRight => 15,
        }
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Corner::TopLeft => "top left",
            Corner::TopRight => "top right",
            Corner::BottomLeft => "bottom left",
            Corner::BottomRight => "bottom right",
        })
    }
}

// Board attributes the rules are built from.

fn row_cells(row: usize) -> [usize; 4] { [row * 4, row * 4 + 1, row * 4 + 2, row * 4 + 3] }

fn column_cells(col: usize) -> [usize; 4] { [col, col + 4, col + 8, col + 12] }

fn line(board: Board, cells: [usize; 4]) -> [u8; 4] { cells.map(|cell| board.exponent(cell)) }

/// Full, and no two neighbours are equal: no move along it changes this line.
pub(crate) fn is_locked(board: Board, cells: [usize; 4]) -> bool {
    let line = line(board, cells);
    line.iter().all(|&e| e != 0) && line.windows(2).all(|pair| pair[0] != pair[1])
}

/// Exponents never rise, or never fall, along the line. Empty cells count
/// as zero.
fn is_monotonic(board: Board, cells: [usize; 4]) -> bool {
    let line = line(board, cells);
    line.windows(2).all(|pair| pair[0] >= pair[1]) || line.windows(2).all(|pair| pair[0] <= pair[1])
}

fn is_empty_line(board: Board, cells: [usize; 4]) -> bool { line(board, cells).iter().all(|&e| e == 0) }

/// Some line along `dir`'s axis has two adjacent equal tiles.
pub(crate) fn is_merge_possible(board: Board, dir: Direction) -> bool {
    (0..4).any(|line| {
        let cells = match dir {
            Direction::Left | Direction::Right => row_cells(line),
            Direction::Up | Direction::Down => column_cells(line),
        };
        cells.windows(2).any(|pair| {
            let a = board.exponent(pair[0]);
            a != 0 && a == board.exponent(pair[1])
        })
    })
}

fn perpendicular(dir: Direction) -> Direction {
    match dir {
        Direction::Up | Direction::Down => Direction::Left,
        Direction::Left | Direction::Right => Direction::Up,
    }
}

fn is_largest_tile_in_corner(board: Board, corner: Corner) -> bool {
    let max = board.max_exponent();
    max != 0 && board.exponent(corner.cell()) == max
}

fn neighbour_pairs() -> impl Iterator<Item = (usize, usize)> {
    let across = (0..4).flat_map(|row| (0..3).map(move |col| (row * 4 + col, row * 4 + col + 1)));
    let down = (0..12).map(|cell| (cell, cell + 4));
    across.chain(down)
}

/// The two largest tiles (ties included) touch horizontally or vertically.
fn are_two_largest_adjacent(board: Board) -> bool {
    let mut tiles: Vec<u8> = board.exponents().into_iter().filter(|&e| e != 0).collect();
    if tiles.len() < 2 {
        return false;
    }
    tiles.sort_unstable_by(|a, b| b.cmp(a));
    let (first, second) = (tiles[0], tiles[1]);
    neighbour_pairs().any(|(a, b)| {
        let (x, y) = (board.exponent(a), board.exponent(b));
        (x == first && y == second) || (x == second && y == first)
    })
}

/// A rule that may forbid one direction for the current board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BanMove {
    Always(Direction),
    IfColumnNotLocked(Direction, Column),
    IfRowNotLocked(Direction, Row),
    IfBreaksMonotonicityOfColumn(Direction, Column),
    IfBreaksMonotonicityOfRow(Direction, Row),
    SeparatesTwoLargestTiles(Direction),
    UnlocksColumn(Direction, Column),
    UnlocksRow(Direction, Row),
    RemovesPotentialMerge(Direction),
    MovesLargestTileOutOfCorner(Direction, Corner),
    FillsColumn(Direction, Column),
    FillsRow(Direction, Row),
}

impl BanMove {
    pub fn direction(&self) -> Direction {
        match *self {
            BanMove::Always(dir)
            | BanMove::IfColumnNotLocked(dir, _)
            | BanMove::IfRowNotLocked(dir, _)
            | BanMove::IfBreaksMonotonicityOfColumn(dir, _)
            | BanMove::IfBreaksMonotonicityOfRow(dir, _)
            | BanMove::SeparatesTwoLargestTiles(dir)
            | BanMove::UnlocksColumn(dir, _)
            | BanMove::UnlocksRow(dir, _)
            | BanMove::RemovesPotentialMerge(dir)
            | BanMove::MovesLargestTileOutOfCorner(dir, _)
            | BanMove::FillsColumn(dir, _)
            | BanMove::FillsRow(dir, _) => dir,
        }
    }

    /// The banned direction, if this rule fires on `board`.
    pub fn execute(&self, board: Board) -> Option<Direction> {
        let dir = self.direction();
        // Attribute held before the move and is lost after it.
        let loses = |held: &dyn Fn(Board) -> bool| held(board) && !held(board.shift(dir));
        let fires = match *self {
            BanMove::Always(_) => true,
            BanMove::IfColumnNotLocked(_, column) => !is_locked(board, column.cells()),
            BanMove::IfRowNotLocked(_, row) => !is_locked(board, row.cells()),
            BanMove::IfBreaksMonotonicityOfColumn(_, column) => loses(&|b: Board| is_monotonic(b, column.cells())),
            BanMove::IfBreaksMonotonicityOfRow(_, row) => loses(&|b: Board| is_monotonic(b, row.cells())),
            BanMove::SeparatesTwoLargestTiles(_) => loses(&are_two_largest_adjacent),
            BanMove::UnlocksColumn(_, column) => loses(&|b: Board| is_locked(b, column.cells())),
            BanMove::UnlocksRow(_, row) => loses(&|b: Board| is_locked(b, row.cells())),
            BanMove::RemovesPotentialMerge(_) => loses(&|b: Board| is_merge_possible(b, perpendicular(dir))),
            BanMove::MovesLargestTileOutOfCorner(_, corner) => loses(&|b: Board| is_largest_tile_in_corner(b, corner)),
            BanMove::FillsColumn(_, column) => loses(&|b: Board| is_empty_line(b, column.cells())),
            BanMove::FillsRow(_, row) => loses(&|b: Board| is_empty_line(b, row.cells())),
        };
        fires.then_some(dir)
    }

    /// Every ban rule worth considering, grouped by kind.
    pub fn all_variations() -> Vec<BanMove> {
        use Direction::{Down, Left, Right, Up};

        let mut rules: Vec<BanMove> = Direction::ALL.into_iter().map(BanMove::Always).collect();
        for dir in [Up, Down] {
            rules.extend(Column::ALL.map(|column| BanMove::IfColumnNotLocked(dir, column)));
        }
        for dir in [Left, Right] {
            rules.extend(Row::ALL.map(|row| BanMove::IfRowNotLocked(dir, row)));
        }
        for dir in [Left, Right] {
            rules.extend(Column::ALL.map(|column| BanMove::IfBreaksMonotonicityOfColumn(dir, column)));
        }
        for dir in [Up, Down] {
            rules.extend(Row::ALL.map(|row| BanMove::IfBreaksMonotonicityOfRow(dir, row)));
        }
        rules.extend(Direction::ALL.map(BanMove::SeparatesTwoLargestTiles));
        for dir in [Left, Right] {
            rules.extend(Column::ALL.map(|column| BanMove::UnlocksColumn(dir, column)));
        }
        for dir in [Up, Down] {
            rules.extend(Row::ALL.map(|row| BanMove::UnlocksRow(dir, row)));
        }
        rules.extend(Direction::ALL.map(BanMove::RemovesPotentialMerge));
        for (dir, corners) in [
            (Left, [Corner::TopRight, Corner::BottomRight]),
            (Right, [Corner::TopLeft, Corner::BottomLeft]),
            (Up, [Corner::BottomLeft, Corner::BottomRight]),
            (Down, [Corner::TopLeft, Corner::TopRight]),
        ] {
            rules.extend(corners.map(|corner| BanMove::MovesLargestTileOutOfCorner(dir, corner)));
        }
        // A move can only fill lines on the side it moves towards.
        for (dir, unreachable) in [(Right, Column::Left), (Left, Column::Right)] {
            rules.extend(Column::ALL.into_iter().filter(|&c| c != unreachable).map(|c| BanMove::FillsColumn(dir, c)));
        }
        for (dir, unreachable) in [(Down, Row::Top), (Up, Row::Bottom)] {
            rules.extend(Row::ALL.into_iter().filter(|&r| r != unreachable).map(|r| BanMove::FillsRow(dir, r)));
        }
        rules
    }
}

impl fmt::Display for BanMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BanMove::Always(dir) => write!(f, "always ban move {dir}"),
            BanMove::IfColumnNotLocked(dir, column) => write!(f, "ban move {dir} if {column} column not locked"),
            BanMove::IfRowNotLocked(dir, row) => write!(f, "ban move {dir} if {row} row not locked"),
            BanMove::IfBreaksMonotonicityOfColumn(dir, column) => {
                write!(f, "ban move {dir} if breaks monotonicity of {column} column")
            }
            BanMove::IfBreaksMonotonicityOfRow(dir, row) => {
                write!(f, "ban move {dir} if breaks monotonicity of {row} row")
            }
            BanMove::SeparatesTwoLargestTiles(dir) => write!(f, "ban move {dir} if separates 2 largest tiles"),
            BanMove::UnlocksColumn(dir, column) => write!(f, "ban move {dir} if unlocks {column} column"),
            BanMove::UnlocksRow(dir, row) => write!(f, "ban move {dir} if unlocks {row} row"),
            BanMove::RemovesPotentialMerge(dir) => write!(f, "ban move {dir} if removes potential merge"),
            BanMove::MovesLargestTileOutOfCorner(dir, corner) => {
                write!(f, "ban move {dir} if moves largest tile out of {corner} corner")
            }
            BanMove::FillsColumn(dir, column) => write!(f, "ban move {dir} if fills {column} column"),
            BanMove::FillsRow(dir, row) => write!(f, "ban move {dir} if fills {row} row"),
        }
    }
}

/// A rule that may propose one direction for the current board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TryMove {
    Always(Direction),
    ProducesMerge(Direction),
    IfMergePossible(Direction),
    IfMovesLargestTileToCorner(Direction, Corner),
    MakesTwoLargestTilesAdjacent(Direction),
    CreatesMonotonicColumn(Direction, Column),
    CreatesMonotonicRow(Direction, Row),
    LocksColumn(Direction, Column),
    LocksRow(Direction, Row),
    ColumnLocked(Direction, Column),
    RowLocked(Direction, Row),
    EmptiesColumn(Direction, Column),
    EmptiesRow(Direction, Row),
}

impl TryMove {
    pub fn direction(&self) -> Direction {
        match *self {
            TryMove::Always(dir)
            | TryMove::ProducesMerge(dir)
            | TryMove::IfMergePossible(dir)
            | TryMove::IfMovesLargestTileToCorner(dir, _)
            | TryMove::MakesTwoLargestTilesAdjacent(dir)
            | TryMove::CreatesMonotonicColumn(dir, _)
            | TryMove::CreatesMonotonicRow(dir, _)
            | TryMove::LocksColumn(dir, _)
            | TryMove::LocksRow(dir, _)
            | TryMove::ColumnLocked(dir, _)
            | TryMove::RowLocked(dir, _)
            | TryMove::EmptiesColumn(dir, _)
            | TryMove::EmptiesRow(dir, _) => dir,
        }
    }

    /// The proposed direction, if this rule fires on `board`. Legality is
    /// checked by the strategy, not here.
    pub fn execute(&self, board: Board) -> Option<Direction> {
        let dir = self.direction();
        // Attribute is missing before the move and holds after it.
        let gains = |held: &dyn Fn(Board) -> bool| !held(board) && held(board.shift(dir));
        let fires = match *self {
            TryMove::Always(_) => true,
            TryMove::ProducesMerge(_) => gains(&|b: Board| is_merge_possible(b, perpendicular(dir))),
            TryMove::IfMergePossible(_) => is_merge_possible(board, dir),
            TryMove::IfMovesLargestTileToCorner(_, corner) => gains(&|b: Board| is_largest_tile_in_corner(b, corner)),
            TryMove::MakesTwoLargestTilesAdjacent(_) => gains(&are_two_largest_adjacent),
            TryMove::CreatesMonotonicColumn(_, column) => gains(&|b: Board| is_monotonic(b, column.cells())),
            TryMove::CreatesMonotonicRow(_, row) => gains(&|b: Board| is_monotonic(b, row.cells())),
            TryMove::LocksColumn(_, column) => gains(&|b: Board| is_locked(b, column.cells())),
            TryMove::LocksRow(_, row) => gains(&|b: Board| is_locked(b, row.cells())),
            TryMove::ColumnLocked(_, column) => is_locked(board, column.cells()),
            TryMove::RowLocked(_, row) => is_locked(board, row.cells()),
            TryMove::EmptiesColumn(_, column) => gains(&|b: Board| is_empty_line(b, column.cells())),
            TryMove::EmptiesRow(_, row) => gains(&|b: Board| is_empty_line(b, row.cells())),
        };
        fires.then_some(dir)
    }

    /// Every try rule worth considering, grouped by kind.
    pub fn all_variations() -> Vec<TryMove> {
        use Direction::{Down, Left, Right, Up};

        let mut rules: Vec<TryMove> = Direction::ALL.into_iter().map(TryMove::Always).collect();
        rules.extend(Direction::ALL.map(TryMove::ProducesMerge));
        rules.extend(Direction::ALL.map(TryMove::IfMergePossible));
        for (dir, corners) in [
            (Left, [Corner::TopLeft, Corner::BottomLeft]),
            (Right, [Corner::TopRight, Corner::BottomRight]),
            (Up, [Corner::TopLeft, Corner::TopRight]),
            (Down, [Corner::BottomLeft, Corner::BottomRight]),
        ] {
            rules.extend(corners.map(|corner| TryMove::IfMovesLargestTileToCorner(dir, corner)));
        }
        rules.extend(Direction::ALL.map(TryMove::MakesTwoLargestTilesAdjacent));
        // Lines on the far side of a move can't be rebuilt by it.
        let columns_towards = |dir: Direction| {
            let far = if dir == Left { Column::Right } else { Column::Left };
            Column::ALL.into_iter().filter(move |&c| c != far)
        };
        let rows_towards = |dir: Direction| {
            let far = if dir == Up { Row::Bottom } else { Row::Top };
            Row::ALL.into_iter().filter(move |&r| r != far)
        };
        for dir in [Left, Right] {
            rules.extend(columns_towards(dir).map(|c| TryMove::CreatesMonotonicColumn(dir, c)));
        }
        for dir in [Up, Down] {
            rules.extend(rows_towards(dir).map(|r| TryMove::CreatesMonotonicRow(dir, r)));
        }
        for dir in [Right, Left] {
            rules.extend(columns_towards(dir).map(|c| TryMove::LocksColumn(dir, c)));
        }
        for dir in [Down, Up] {
            rules.extend(rows_towards(dir).map(|r| TryMove::LocksRow(dir, r)));
        }
        for dir in [Left, Right] {
            rules.extend(Row::ALL.map(|row| TryMove::RowLocked(dir, row)));
        }
        for dir in [Up, Down] {
            rules.extend(Column::ALL.map(|column| TryMove::ColumnLocked(dir, column)));
        }
        // A move empties lines on the side it moves away from.
        for (dir, near) in [(Left, Column::Left), (Right, Column::Right)] {
            rules.extend(Column::ALL.into_iter().filter(|&c| c != near).map(|c| TryMove::EmptiesColumn(dir, c)));
        }
        for (dir, near) in [(Up, Row::Top), (Down, Row::Bottom)] {
            rules.extend(Row::ALL.into_iter().filter(|&r| r != near).map(|r| TryMove::EmptiesRow(dir, r)));
        }
        rules
    }
}

impl fmt::Display for TryMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryMove::Always(dir) => write!(f, "always try move {dir}"),
            TryMove::ProducesMerge(dir) => write!(f, "try move {dir} if produces merge"),
            TryMove::IfMergePossible(dir) => write!(f, "try move {dir} if merge possible"),
            TryMove::IfMovesLargestTileToCorner(dir, corner) => {
                write!(f, "try move {dir} if moves largest tile to {corner} corner")
            }
            TryMove::MakesTwoLargestTilesAdjacent(dir) => write!(f, "try move {dir} if makes 2 largest tiles adjacent"),
            TryMove::CreatesMonotonicColumn(dir, column) => {
                write!(f, "try move {dir} if creates monotonic {column} column")
            }
            TryMove::CreatesMonotonicRow(dir, row) => write!(f, "try move {dir} if creates monotonic {row} row"),
            TryMove::LocksColumn(dir, column) => write!(f, "try move {dir} if locks {column} column"),
            TryMove::LocksRow(dir, row) => write!(f, "try move {dir} if locks {row} row"),
            TryMove::ColumnLocked(dir, column) => write!(f, "try move {dir} if {column} column locked"),
            TryMove::RowLocked(dir, row) => write!(f, "try move {dir} if {row} row locked"),
            TryMove::EmptiesColumn(dir, column) => write!(f, "try move {dir} if empties {column} column"),
            TryMove::EmptiesRow(dir, row) => write!(f, "try move {dir} if empties {row} row"),
        }
    }
}

/// Candidate pools for a strategy search: every ban rule and every try rule.
///
/// ```
/// use ai_2048::agent::strategy::generate_all_variations;
/// let (bans, tries) = generate_all_variations();
/// assert_eq!((bans.len(), tries.len()), (80, 76));
/// ```
pub fn generate_all_variations() -> (Vec<BanMove>, Vec<TryMove>) { (BanMove::all_variations(), TryMove::all_variations()) }
