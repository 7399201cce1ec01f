use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// A direction to move/merge tiles.
///
/// [`Direction::ALL`] is the fixed enumeration order every agent uses to
/// break ties between equally valued moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    /// Enumeration order: first wins on ties.
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Right, Direction::Down, Direction::Left];

    /// External integer code (0=Up, 1=Right, 2=Down, 3=Left).
    #[inline]
    pub fn code(self) -> u8 {
        match self {
            Direction::Up => 0,
            Direction::Right => 1,
            Direction::Down => 2,
            Direction::Left => 3,
        }
    }

    /// Inverse of [`Direction::code`].
    #[inline]
    pub fn from_code(code: u8) -> Option<Self> {
        Direction::ALL.get(code as usize).copied()
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Up => "up",
            Direction::Right => "right",
            Direction::Down => "down",
            Direction::Left => "left",
        };
        f.write_str(s)
    }
}

/// Number of cells on the board.
pub const CELLS: usize = 16;

/// Largest exponent a nibble can hold (tile 32768). Two such tiles never merge.
pub const MAX_EXPONENT: u8 = 15;

const LINE_TABLE_SIZE: usize = 0x1_0000; // 65,536 possible 16-bit lines

struct Stores {
    shift_left: Box<[u64]>,
    shift_right: Box<[u64]>,
    shift_up: Box<[u64]>,
    shift_down: Box<[u64]>,
    merge_left: Box<[u32]>,
    merge_right: Box<[u32]>,
    score: Box<[Score]>,
}

type BoardRaw = u64;
type Line = u64;
type Tile = u8;
type Score = u64;

/// Violations of the board's preconditions.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardError {
    #[error("cell {0} is out of range (0..16)")]
    CellOutOfRange(usize),
    #[error("cell {0} is already occupied")]
    CellOccupied(usize),
    #[error("exponent {exponent} at cell {cell} is outside the supported range")]
    InvalidExponent { cell: usize, exponent: u8 },
}

/// Packed 4x4 2048 board as 16 4-bit nibbles in a `u64`.
///
/// Cell `i = 4 * row + col` lives in bits `60 - 4i ..= 63 - 4i` (row-major,
/// most significant nibble first). Each nibble holds the tile's exponent,
/// 0 meaning empty.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board(BoardRaw);

/// Result of sliding a board in one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Board after sliding/merging, before any spawn.
    pub board: Board,
    /// False when the direction is blocked; `board` then equals the input.
    pub moved: bool,
    /// Sum of the values of tiles produced by merges in this move.
    pub merge_score: Score,
}

impl Board {
    /// A constant empty board (all zeros).
    pub const EMPTY: Board = Board(0);

    /// Construct a `Board` from its raw packed representation.
    #[inline]
    pub fn from_raw(raw: BoardRaw) -> Self { Board(raw) }

    /// Consume this `Board`, returning the raw packed `u64`.
    #[inline]
    pub fn into_raw(self) -> BoardRaw { self.0 }

    /// Borrow the raw packed `u64` for this `Board`.
    #[inline]
    pub fn raw(&self) -> BoardRaw { self.0 }

    /// Build a board from 16 row-major exponents (0 = empty).
    ///
    /// ```
    /// use ai_2048::engine::Board;
    /// let b = Board::from_exponents([1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
    /// assert_eq!(b.raw(), 0x1100_0000_0000_0000);
    /// ```
    pub fn from_exponents(exponents: [u8; CELLS]) -> Result<Self, BoardError> {
        exponents.iter().enumerate().try_fold(Board::EMPTY, |board, (cell, &exponent)| {
            if exponent > MAX_EXPONENT {
                return Err(BoardError::InvalidExponent { cell, exponent });
            }
            Ok(Board(board.0 | ((exponent as BoardRaw) << nibble_shift(cell))))
        })
    }

    /// The 16 exponents in row-major order.
    pub fn exponents(self) -> [u8; CELLS] {
        let mut out = [0u8; CELLS];
        for (cell, slot) in out.iter_mut().enumerate() {
            *slot = self.exponent(cell);
        }
        out
    }

    /// Exponent stored at `cell` (0 if empty). `cell` must be below 16.
    #[inline]
    pub fn exponent(self, cell: usize) -> u8 {
        debug_assert!(cell < CELLS);
        ((self.0 >> nibble_shift(cell)) & 0xf) as u8
    }

    /// Return the board resulting from sliding/merging tiles in `dir` (no random insert).
    ///
    /// Example
    /// ```
    /// use ai_2048::engine::{Board, Direction};
    /// let b = Board::from_raw(0x2020_0000_0000_0000);
    /// assert_eq!(b.shift(Direction::Left), Board::from_raw(0x3000_0000_0000_0000));
    /// ```
    #[inline]
    pub fn shift(self, dir: Direction) -> Self {
        let s = stores();
        let raw = match dir {
            Direction::Left => shift_rows(self.0, &s.shift_left),
            Direction::Right => shift_rows(self.0, &s.shift_right),
            Direction::Up => shift_cols(self.0, &s.shift_up),
            Direction::Down => shift_cols(self.0, &s.shift_down),
        };
        Board(raw)
    }

    /// Slide/merge in `dir`, reporting whether anything moved and the merge score.
    ///
    /// ```
    /// use ai_2048::engine::{Board, Direction};
    /// let out = Board::from_raw(0x1100_0000_0000_0000).apply(Direction::Left);
    /// assert!(out.moved);
    /// assert_eq!(out.merge_score, 4);
    /// assert_eq!(out.board.exponent(0), 2);
    /// ```
    pub fn apply(self, dir: Direction) -> MoveOutcome {
        let board = self.shift(dir);
        if board == self {
            return MoveOutcome { board, moved: false, merge_score: 0 };
        }
        let s = stores();
        let merge_score = match dir {
            Direction::Left => merge_rows(self.0, &s.merge_left),
            Direction::Right => merge_rows(self.0, &s.merge_right),
            Direction::Up => merge_rows(transpose(self.0), &s.merge_left),
            Direction::Down => merge_rows(transpose(self.0), &s.merge_right),
        };
        MoveOutcome { board, moved: true, merge_score }
    }

    /// Directions that change the board, in [`Direction::ALL`] order.
    #[inline]
    pub fn legal_moves(self) -> impl Iterator<Item = Direction> {
        Direction::ALL.into_iter().filter(move |&dir| self.shift(dir) != self)
    }

    /// Return true if no legal moves remain.
    ///
    /// ```
    /// use ai_2048::engine::Board;
    /// // On an empty board, shifting in any direction doesn't change the board.
    /// assert!(Board::EMPTY.is_terminal());
    /// ```
    #[inline]
    pub fn is_terminal(self) -> bool { self.legal_moves().next().is_none() }

    /// Indices of the empty cells, row-major. Empty iff the board is full.
    pub fn available_cells(self) -> Vec<usize> {
        (0..CELLS).filter(|&cell| self.exponent(cell) == 0).collect()
    }

    /// Place a tile with `exponent` into the empty `cell`.
    pub fn spawn(self, cell: usize, exponent: u8) -> Result<Self, BoardError> {
        if cell >= CELLS {
            return Err(BoardError::CellOutOfRange(cell));
        }
        if exponent == 0 || exponent > MAX_EXPONENT {
            return Err(BoardError::InvalidExponent { cell, exponent });
        }
        if self.exponent(cell) != 0 {
            return Err(BoardError::CellOccupied(cell));
        }
        Ok(Board(self.0 | ((exponent as BoardRaw) << nibble_shift(cell))))
    }

    /// Insert a random 2 (90%) or 4 (10%) tile into a random empty slot, using the provided RNG.
    ///
    /// A full board is returned unchanged.
    ///
    /// ```
    /// use ai_2048::engine::Board;
    /// use rand::{SeedableRng, rngs::StdRng};
    /// let mut rng = StdRng::seed_from_u64(123);
    /// let b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    /// assert_eq!(b.count_empty(), 14);
    /// ```
    #[inline]
    pub fn with_random_tile<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        let empty = self.count_empty();
        if empty == 0 {
            return self;
        }
        let mut index = rng.gen_range(0..empty);
        let mut tmp = self.0;
        let mut tile = generate_random_tile(rng);
        loop {
            while (tmp & 0xf) != 0 {
                tmp >>= 4;
                tile <<= 4;
            }
            if index == 0 { break; }
            index -= 1;
            tmp >>= 4;
            tile <<= 4;
        }
        Board(self.0 | tile)
    }

    /// Perform a move then insert a random tile if the move changed the board, using the provided RNG.
    ///
    /// ```
    /// use ai_2048::engine::{Board, Direction};
    /// use rand::{SeedableRng, rngs::StdRng};
    /// let mut rng = StdRng::seed_from_u64(1);
    /// let b0 = Board::from_raw(0x1100_0000_0000_0000);
    /// let b1 = b0.make_move(Direction::Left, &mut rng);
    /// assert_eq!(b1.exponent(0), 2);
    /// assert_eq!(b1.count_empty(), 14);
    /// ```
    #[inline]
    pub fn make_move<R: Rng + ?Sized>(self, direction: Direction, rng: &mut R) -> Self {
        let moved = self.shift(direction);
        if moved != self { moved.with_random_tile(rng) } else { self }
    }

    /// Game score implied by the tiles: every tile of value `2^e` (e >= 2)
    /// counts the merges that built it, `(e - 1) * 2^e`.
    #[inline]
    pub fn score(self) -> Score {
        let score_table = &stores().score;
        (0..4).fold(0, |acc, idx| acc + score_table[extract_line(self.0, idx) as usize])
    }

    /// Sum of all tile values.
    pub fn tile_sum(self) -> u64 {
        (0..CELLS).map(|cell| self.tile_value(cell) as u64).sum()
    }

    /// Largest exponent on the board (0 for an empty board).
    #[inline]
    pub fn max_exponent(self) -> u8 {
        (0..CELLS).fold(0, |acc, cell| acc.max(self.exponent(cell)))
    }

    /// Return the highest tile value (e.g., 2048) present on the board, 0 when empty.
    #[inline]
    pub fn highest_tile(self) -> u64 {
        match self.max_exponent() {
            0 => 0,
            e => 1 << e,
        }
    }

    /// Count the number of empty cells on the board.
    // https://stackoverflow.com/questions/38225571/count-number-of-zero-nibbles-in-an-unsigned-64-bit-integer
    #[inline]
    pub fn count_empty(self) -> u64 {
        let mut board_copy = self.0;
        board_copy |= board_copy >> 1;
        board_copy |= board_copy >> 2;
        board_copy &= 0x1111_1111_1111_1111;
        16 - board_copy.count_ones() as u64
    }

    /// Number of distinct non-empty tile values.
    // Credit to Nneonneo
    pub fn count_distinct(self) -> u32 {
        let mut bitset = 0u32;
        let mut board_copy = self.0;
        while board_copy != 0 {
            bitset |= 1 << (board_copy & 0xf);
            board_copy >>= 4;
        }
        (bitset >> 1).count_ones() // don't count empty tiles
    }

    /// Get the actual value at `cell` (0 if empty).
    ///
    /// Index runs 0..16 row-major.
    #[inline]
    pub fn tile_value(self, cell: usize) -> u32 {
        match self.exponent(cell) {
            0 => 0,
            e => 1 << e,
        }
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:#018x})", self.0)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<String> = self.exponents().iter().map(format_val).collect();
        for (row, chunk) in cells.chunks(4).enumerate() {
            if row > 0 {
                writeln!(f, "--------------------------------")?;
            }
            writeln!(f, "{}|{}|{}|{}", chunk[0], chunk[1], chunk[2], chunk[3])?;
        }
        Ok(())
    }
}

impl From<BoardRaw> for Board { fn from(v: BoardRaw) -> Self { Board::from_raw(v) } }
impl From<Board> for BoardRaw { fn from(b: Board) -> Self { b.into_raw() } }

/// Initialize lookup tables eagerly. Safe to call multiple times; every
/// board operation initializes them lazily otherwise.
pub fn init() {
    STORES.get_or_init(create_stores);
}

#[inline(always)]
fn nibble_shift(cell: usize) -> u32 { (60 - 4 * cell) as u32 }

// Credit to Nneonneo
pub(crate) fn transpose(x: BoardRaw) -> BoardRaw {
    let a1 = x & 0xF0F00F0FF0F00F0F;
    let a2 = x & 0x0000F0F00000F0F0;
    let a3 = x & 0x0F0F00000F0F0000;
    let a = a1 | (a2 << 12) | (a3 >> 12);
    let b1 = a & 0xFF00FF0000FF00FF;
    let b2 = a & 0x00FF00FF00000000;
    let b3 = a & 0x00000000FF00FF00;
    b1 | (b2 >> 24) | (b3 << 24)
}

#[inline(always)]
pub(crate) fn extract_line(board: BoardRaw, line_idx: u64) -> Line {
    (board >> ((3 - line_idx) * 16)) & 0xffff
}

/// The four exponents of a 16-bit line, leading nibble first.
#[inline]
pub(crate) fn line_tiles(line: Line) -> [Tile; 4] {
    [
        ((line >> 12) & 0xf) as Tile,
        ((line >> 8) & 0xf) as Tile,
        ((line >> 4) & 0xf) as Tile,
        (line & 0xf) as Tile,
    ]
}

static STORES: OnceLock<Stores> = OnceLock::new();

fn create_stores() -> Stores {
    // Allocate on the heap to avoid large stack frames
    let mut shift_left = vec![0u64; LINE_TABLE_SIZE];
    let mut shift_right = vec![0u64; LINE_TABLE_SIZE];
    let mut shift_up = vec![0u64; LINE_TABLE_SIZE];
    let mut shift_down = vec![0u64; LINE_TABLE_SIZE];
    let mut merge_left = vec![0u32; LINE_TABLE_SIZE];
    let mut merge_right = vec![0u32; LINE_TABLE_SIZE];
    let mut score = vec![0u64; LINE_TABLE_SIZE];

    for val in 0..LINE_TABLE_SIZE {
        let tiles = line_tiles(val as Line);
        let (left, left_merge) = shift_tiles_left(tiles);
        let (right, right_merge) = shift_tiles_right(tiles);
        shift_left[val] = tiles_to_row(left);
        shift_right[val] = tiles_to_row(right);
        shift_up[val] = tiles_to_col(left);
        shift_down[val] = tiles_to_col(right);
        merge_left[val] = left_merge;
        merge_right[val] = right_merge;
        score[val] = calc_score(tiles);
    }

    Stores {
        shift_left: shift_left.into_boxed_slice(),
        shift_right: shift_right.into_boxed_slice(),
        shift_up: shift_up.into_boxed_slice(),
        shift_down: shift_down.into_boxed_slice(),
        merge_left: merge_left.into_boxed_slice(),
        merge_right: merge_right.into_boxed_slice(),
        score: score.into_boxed_slice(),
    }
}

#[inline(always)]
fn stores() -> &'static Stores {
    STORES.get_or_init(create_stores)
}

fn generate_random_tile<R: Rng + ?Sized>(rng: &mut R) -> BoardRaw { if rng.gen_range(0..10) < 9 { 1 } else { 2 } }

#[inline]
fn shift_rows(board: BoardRaw, table: &[u64]) -> BoardRaw {
    (0..4).fold(0, |new_board, row_idx| {
        let row_val = extract_line(board, row_idx) as usize;
        new_board | (table[row_val] << (48 - (16 * row_idx)))
    })
}

#[inline]
fn shift_cols(board: BoardRaw, table: &[u64]) -> BoardRaw {
    let transpose_board = transpose(board);
    (0..4).fold(0, |new_board, col_idx| {
        let col_val = extract_line(transpose_board, col_idx) as usize;
        new_board | (table[col_val] << (12 - (4 * col_idx)))
    })
}

#[inline]
fn merge_rows(board: BoardRaw, table: &[u32]) -> Score {
    (0..4).fold(0, |acc, line_idx| acc + table[extract_line(board, line_idx) as usize] as Score)
}

fn tiles_to_row(tiles: [Tile; 4]) -> Line {
    (tiles[0] as Line) << 12 | (tiles[1] as Line) << 8 | (tiles[2] as Line) << 4 | tiles[3] as Line
}

fn tiles_to_col(tiles: [Tile; 4]) -> Line {
    (tiles[0] as Line) << 48 | (tiles[1] as Line) << 32 | (tiles[2] as Line) << 16 | tiles[3] as Line
}

fn shift_tiles_right(tiles: [Tile; 4]) -> ([Tile; 4], u32) {
    let [a, b, c, d] = tiles;
    let ([w, x, y, z], merged) = shift_tiles_left([d, c, b, a]);
    ([z, y, x, w], merged)
}

fn shift_tiles_left(mut tiles: [Tile; 4]) -> ([Tile; 4], u32) {
    let mut merged = 0;
    for i in 0..4 {
        merged += calculate_left_shift(&mut tiles[i..]);
    }
    (tiles, merged)
}

/// Pull the first tile of `slice` to its front, merging it with the next
/// equal tile. Returns the value of the merged tile, or 0.
fn calculate_left_shift(slice: &mut [Tile]) -> u32 {
    let mut acc = 0;
    let mut merged = 0;
    for idx in 0..slice.len() {
        let val = slice[idx];
        if val == 0 {
            continue;
        }
        if acc == 0 {
            slice[idx] = 0;
            acc = val;
            continue;
        }
        if acc == val && acc < MAX_EXPONENT {
            slice[idx] = 0;
            acc += 1;
            merged = 1 << acc;
        }
        break;
    }
    slice[0] = acc;
    merged
}

// Credit to Nneonneo
fn calc_score(tiles: [Tile; 4]) -> Score {
    let mut score = 0;
    for &tile_val in tiles.iter() {
        if tile_val >= 2 {
            // the score is the total sum of the tile and all intermediate merged tiles
            score += (tile_val as Score - 1) * (1 << tile_val);
        }
    }
    score
}

fn format_val(val: &u8) -> String {
    match val {
        0 => String::from("       "),
        &x => format!("{:^7}", 1u32 << x),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn shift_row(row: u64, dir: Direction) -> u64 {
        Board::from_raw(row).shift(dir).raw()
    }

    #[test]
    fn it_shift_tiles_left() {
        assert_eq!(shift_tiles_left([0, 0, 0, 0]), ([0, 0, 0, 0], 0));
        assert_eq!(shift_tiles_left([1, 2, 1, 2]), ([1, 2, 1, 2], 0));
        assert_eq!(shift_tiles_left([1, 1, 2, 2]), ([2, 3, 0, 0], 4 + 8));
        assert_eq!(shift_tiles_left([1, 0, 0, 1]), ([2, 0, 0, 0], 4));
        assert_eq!(shift_tiles_left([1, 1, 1, 1]), ([2, 2, 0, 0], 8));
    }

    #[test]
    fn it_shift_tiles_right() {
        assert_eq!(shift_tiles_right([0, 0, 0, 0]), ([0, 0, 0, 0], 0));
        assert_eq!(shift_tiles_right([1, 2, 1, 2]), ([1, 2, 1, 2], 0));
        assert_eq!(shift_tiles_right([1, 1, 2, 2]), ([0, 0, 2, 3], 4 + 8));
        assert_eq!(shift_tiles_right([5, 0, 0, 5]), ([0, 0, 0, 6], 64));
        assert_eq!(shift_tiles_right([0, 2, 2, 2]), ([0, 0, 2, 3], 8));
    }

    #[test]
    fn it_never_merges_max_exponent() {
        assert_eq!(shift_tiles_left([15, 15, 0, 0]), ([15, 15, 0, 0], 0));
        assert_eq!(shift_tiles_left([0, 15, 0, 15]), ([15, 15, 0, 0], 0));
        assert_eq!(shift_tiles_left([14, 14, 15, 0]), ([15, 15, 0, 0], 1 << 15));
    }

    #[test]
    fn test_shift_left() {
        assert_eq!(shift_row(0x0000, Direction::Left), 0x0000);
        assert_eq!(shift_row(0x0002, Direction::Left), 0x2000);
        assert_eq!(shift_row(0x2020, Direction::Left), 0x3000);
        assert_eq!(shift_row(0x1332, Direction::Left), 0x1420);
        assert_eq!(shift_row(0x1234, Direction::Left), 0x1234);
        assert_eq!(shift_row(0x1002, Direction::Left), 0x1200);
        assert_ne!(shift_row(0x1210, Direction::Left), 0x2200);
    }

    #[test]
    fn test_shift_right() {
        assert_eq!(shift_row(0x0000, Direction::Right), 0x0000);
        assert_eq!(shift_row(0x2000, Direction::Right), 0x0002);
        assert_eq!(shift_row(0x2020, Direction::Right), 0x0003);
        assert_eq!(shift_row(0x1332, Direction::Right), 0x0142);
        assert_eq!(shift_row(0x1234, Direction::Right), 0x1234);
        assert_eq!(shift_row(0x1002, Direction::Right), 0x0012);
        assert_ne!(shift_row(0x0121, Direction::Right), 0x0022);
    }

    #[test]
    fn test_move_left() {
        let game = Board::from_raw(0x1234133220021002);
        assert_eq!(game.shift(Direction::Left), Board::from_raw(0x1234142030001200));
    }

    #[test]
    fn test_move_up() {
        let game = Board::from_raw(0x1121230033004222);
        assert_eq!(game.shift(Direction::Up), Board::from_raw(0x1131240232004000));
    }

    #[test]
    fn test_move_right() {
        let game = Board::from_raw(0x1234133220021002);
        assert_eq!(game.shift(Direction::Right), Board::from_raw(0x1234014200030012));
    }

    #[test]
    fn test_move_down() {
        let game = Board::from_raw(0x1121230033004222);
        assert_eq!(game.shift(Direction::Down), Board::from_raw(0x1000210034014232));
    }

    #[test]
    fn apply_reports_merge_score_per_direction() {
        let game = Board::from_raw(0x1121230033004222);
        // Column 1 merges two 8s into 16, column 2 merges two 4s into 8.
        let up = game.apply(Direction::Up);
        assert!(up.moved);
        assert_eq!(up.merge_score, 16 + 8);
        let down = game.apply(Direction::Down);
        assert_eq!(down.board, Board::from_raw(0x1000210034014232));
        assert_eq!(down.merge_score, 16 + 8);
    }

    #[test]
    fn apply_scenario_two_twos_left() {
        let board = Board::from_exponents([1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        let out = board.apply(Direction::Left);
        assert!(out.moved);
        assert_eq!(out.merge_score, 4);
        assert_eq!(out.board.exponents(), [2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(out.board.tile_value(0), 4);
    }

    #[test]
    fn blocked_move_leaves_board_identical() {
        let board = Board::from_raw(0x1234_0000_0000_0000);
        for dir in [Direction::Left, Direction::Right, Direction::Up] {
            let out = board.apply(dir);
            assert!(!out.moved, "{dir} should be blocked");
            assert_eq!(out.board, board);
            assert_eq!(out.merge_score, 0);
        }
        assert!(board.apply(Direction::Down).moved);
    }

    #[test]
    fn merges_conserve_tile_sum() {
        let mut rng = StdRng::seed_from_u64(99);
        let mut board = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
        for step in 0..200 {
            let dir = Direction::ALL[step % 4];
            let out = board.apply(dir);
            // Each merge replaces two tiles of value v by one tile of value 2v.
            assert_eq!(out.board.tile_sum(), board.tile_sum());
            assert_eq!(out.board.score(), board.score() + out.merge_score);
            if out.moved {
                board = out.board.with_random_tile(&mut rng);
            }
        }
    }

    #[test]
    fn terminal_detection() {
        // Full, no adjacent equal tiles.
        let stuck = Board::from_raw(0x1234_4321_1234_4321);
        assert!(stuck.is_terminal());
        assert_eq!(stuck.legal_moves().count(), 0);
        for dir in Direction::ALL {
            assert!(!stuck.apply(dir).moved);
        }
        // Full, one adjacent pair in the top row.
        let mergeable = Board::from_raw(0x1134_4321_1234_4321);
        assert_eq!(mergeable.count_empty(), 0);
        assert!(!mergeable.is_terminal());
        assert_eq!(mergeable.legal_moves().collect::<Vec<_>>(), vec![Direction::Right, Direction::Left]);
    }

    #[test]
    fn spawn_checks_preconditions() {
        let board = Board::from_raw(0x1000_0000_0000_0000);
        assert_eq!(board.spawn(0, 1), Err(BoardError::CellOccupied(0)));
        assert_eq!(board.spawn(16, 1), Err(BoardError::CellOutOfRange(16)));
        assert_eq!(board.spawn(3, 0), Err(BoardError::InvalidExponent { cell: 3, exponent: 0 }));
        assert_eq!(board.spawn(3, 16), Err(BoardError::InvalidExponent { cell: 3, exponent: 16 }));
        assert_eq!(board.spawn(15, 2), Ok(Board::from_raw(0x1000_0000_0000_0002)));
    }

    #[test]
    fn available_cells_lists_empty_positions() {
        let board = Board::from_raw(0x1111_0000_1111_0000);
        assert_eq!(board.available_cells(), vec![4, 5, 6, 7, 12, 13, 14, 15]);
        assert!(Board::from_raw(0x1234_4321_1234_4321).available_cells().is_empty());
    }

    #[test]
    fn exponents_round_trip() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..100 {
            let raw: u64 = rand::Rng::gen(&mut rng);
            let board = Board::from_raw(raw);
            assert_eq!(Board::from_exponents(board.exponents()), Ok(board));
        }
        let mut bad = [0u8; CELLS];
        bad[7] = 16;
        assert_eq!(Board::from_exponents(bad), Err(BoardError::InvalidExponent { cell: 7, exponent: 16 }));
    }

    #[test]
    fn it_insert_random_tile() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut game = Board::EMPTY;
        for _ in 0..16 {
            game = game.with_random_tile(&mut rng);
        }
        assert_eq!(game.count_empty(), 0);
        assert_eq!(game.with_random_tile(&mut rng), game);
    }

    #[test]
    fn it_count_empty() {
        assert_eq!(Board::from_raw(0x1111000011110000).count_empty(), 8);
        assert_eq!(Board::from_raw(0x1100000000000000).count_empty(), 14);
        assert_eq!(Board::from_raw(0x1134000000000000).count_empty(), 12);
    }

    #[test]
    fn it_count_distinct() {
        assert_eq!(Board::EMPTY.count_distinct(), 0);
        assert_eq!(Board::from_raw(0x1134_0000_0000_0001).count_distinct(), 3);
    }

    #[test]
    fn it_get_tile_val() {
        let game = Board::from_raw(0x0123456789abcdef);
        assert_eq!(game.tile_value(0), 0);
        assert_eq!(game.tile_value(3), 8);
        assert_eq!(game.tile_value(10), 1024);
        assert_eq!(game.tile_value(15), 32768);
        assert_eq!(game.highest_tile(), 32768);
        assert_eq!(Board::EMPTY.highest_tile(), 0);
    }

    #[test]
    fn score_counts_merged_value() {
        // A 4 is worth one merge (4), an 8 is worth 8 + 2 * 4 = 16.
        assert_eq!(Board::from_raw(0x2000_0000_0000_0000).score(), 4);
        assert_eq!(Board::from_raw(0x3000_0000_0000_0001).score(), 16);
    }

    #[test]
    fn direction_codes() {
        for (i, dir) in Direction::ALL.into_iter().enumerate() {
            assert_eq!(dir.code() as usize, i);
            assert_eq!(Direction::from_code(i as u8), Some(dir));
        }
        assert_eq!(Direction::from_code(4), None);
    }
}
