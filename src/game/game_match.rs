//! Per-match state machine.
//!
//! A [`Match`] owns one board, one validator and one clock, plus two seats and
//! the pending two-party offers. Every mutating entry point checks the
//! caller's seat and the current status first and returns a [`GameError`]
//! without touching any state when a precondition fails.
//!
//! Time-sensitive operations take the current [`Instant`] from the caller.

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::clock::match_clock::MatchClock;
use crate::clock::time_control::TimeControl;
use crate::errors::{GameError, GameResult, OfferKind};
use crate::game_state::board::Board;
use crate::game_state::chess_types::*;
use crate::game_state::undo_state::MoveRecord;
use crate::move_generation::move_validator::{DrawReason, MoveValidator};
use crate::session::game_code::GameCode;
use crate::session::identity::{Identity, UserId};
use crate::utils::render_game_state::render_board;

/// Unique identifier for a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(Uuid);

impl MatchId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MatchId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Waiting,
    Active,
    Checkmate,
    Stalemate,
    Draw,
    Resigned,
    Timeout,
}

impl MatchStatus {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Waiting | Self::Active)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Checkmate => "checkmate",
            Self::Stalemate => "stalemate",
            Self::Draw => "draw",
            Self::Resigned => "resigned",
            Self::Timeout => "timeout",
        };
        f.write_str(label)
    }
}

/// Why a match ended, as reported in `game_end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Checkmate,
    Stalemate,
    Draw,
    Resigned,
    Timeout,
    Surrender,
    OpponentLeft,
    OpponentDisconnected,
}

/// An armed offer, keyed by the color that made it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingOffer {
    pub requester: Color,
}

/// Result of an accepted move.
#[derive(Debug, Clone, Copy)]
pub struct MoveOutcome {
    pub record: MoveRecord,
    /// Whether the side now to move is in check.
    pub is_check: bool,
}

#[derive(Debug)]
pub struct Match {
    id: MatchId,
    board: Board,
    validator: MoveValidator,
    clock: MatchClock,
    seats: [Option<Identity>; 2],
    status: MatchStatus,
    winner: Option<Color>,
    end_reason: Option<EndReason>,
    draw_reason: Option<DrawReason>,
    pending_undo: Option<PendingOffer>,
    pending_draw: Option<PendingOffer>,
    pending_rematch: Option<PendingOffer>,
    time_control: TimeControl,
    code: Option<GameCode>,
    created_at: DateTime<Utc>,
    // One-shot marker for announcing the current ending.
    end_processed: bool,
    // Latched once ratings are recorded; only a rematch clears it.
    results_recorded: bool,
    // Ply count at which a move ended the match.
    ended_on_ply: Option<usize>,
    // Bumped whenever a new run of the match starts; sync tasks from an older
    // run stop when they see a different value.
    epoch: u64,
}

impl Match {
    pub fn new(time_control: TimeControl, code: Option<GameCode>) -> Self {
        Self {
            id: MatchId::new(),
            board: Board::new_game(),
            validator: MoveValidator::new(),
            clock: MatchClock::new(time_control),
            seats: [None, None],
            status: MatchStatus::Waiting,
            winner: None,
            end_reason: None,
            draw_reason: None,
            pending_undo: None,
            pending_draw: None,
            pending_rematch: None,
            time_control,
            code,
            created_at: Utc::now(),
            end_processed: false,
            results_recorded: false,
            ended_on_ply: None,
            epoch: 0,
        }
    }

    // --- Read access ---

    pub fn id(&self) -> MatchId {
        self.id
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn clock(&self) -> &MatchClock {
        &self.clock
    }

    pub fn status(&self) -> MatchStatus {
        self.status
    }

    pub fn winner(&self) -> Option<Color> {
        self.winner
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    pub fn draw_reason(&self) -> Option<DrawReason> {
        self.draw_reason
    }

    pub fn time_control(&self) -> TimeControl {
        self.time_control
    }

    pub fn code(&self) -> Option<&GameCode> {
        self.code.as_ref()
    }

    pub fn is_private(&self) -> bool {
        self.code.is_some()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn current_turn(&self) -> Color {
        self.board.side_to_move
    }

    pub fn is_check(&self, color: Color) -> bool {
        self.validator.is_check(&self.board, color)
    }

    pub fn pending_offer(&self, kind: OfferKind) -> Option<PendingOffer> {
        match kind {
            OfferKind::Undo => self.pending_undo,
            OfferKind::Draw => self.pending_draw,
            OfferKind::Rematch => self.pending_rematch,
        }
    }

    pub fn seat(&self, color: Color) -> Option<&Identity> {
        self.seats[color.index()].as_ref()
    }

    pub fn color_of(&self, user: &UserId) -> Option<Color> {
        Color::BOTH
            .into_iter()
            .find(|color| self.seat(*color).is_some_and(|seat| &seat.id == user))
    }

    pub fn is_full(&self) -> bool {
        self.seats.iter().all(Option::is_some)
    }

    pub fn is_empty(&self) -> bool {
        self.seats.iter().all(Option::is_none)
    }

    /// Users currently seated, white first.
    pub fn participants(&self) -> Vec<UserId> {
        self.seats
            .iter()
            .flatten()
            .map(|seat| seat.id.clone())
            .collect()
    }

    // --- Seating ---

    /// Seat a player in the first free seat (white before black). Filling the
    /// second seat of a waiting match starts it.
    pub fn add_player(&mut self, player: Identity, now: Instant) -> GameResult<Color> {
        if self.color_of(&player.id).is_some() {
            return Err(GameError::AlreadyInGame);
        }
        let color = Color::BOTH
            .into_iter()
            .find(|color| self.seats[color.index()].is_none())
            .ok_or(GameError::GameFull)?;

        debug!(match_id = %self.id, user_id = %player.id, %color, "player seated");
        self.seats[color.index()] = Some(player);

        if self.is_full() && self.status == MatchStatus::Waiting {
            self.status = MatchStatus::Active;
            self.epoch += 1;
            self.clock.start_at(self.board.side_to_move, now);
            info!(match_id = %self.id, time_control = %self.time_control, "match started");
        }
        Ok(color)
    }

    /// Vacate the seat held by `user`. Does not change status; see [`Match::forfeit`].
    pub fn remove_player(&mut self, user: &UserId) -> Option<Color> {
        let color = self.color_of(user)?;
        self.seats[color.index()] = None;
        for offer in [
            &mut self.pending_undo,
            &mut self.pending_draw,
            &mut self.pending_rematch,
        ] {
            *offer = None;
        }
        if self.is_empty() {
            self.clock.stop();
        }
        Some(color)
    }

    /// Departure of a seated player. Only a full, active match is forfeited;
    /// leaving a waiting or finished match is a plain withdrawal.
    pub fn forfeit(&mut self, user: &UserId, reason: EndReason) -> Option<Color> {
        let color = self.color_of(user)?;
        if self.status != MatchStatus::Active || !self.is_full() {
            return None;
        }
        let winner = color.opposite();
        self.finish(MatchStatus::Resigned, Some(winner), reason);
        Some(winner)
    }

    // --- Play ---

    pub fn make_move(
        &mut self,
        user: &UserId,
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
        now: Instant,
    ) -> GameResult<MoveOutcome> {
        let color = self.color_of(user).ok_or(GameError::NotInGame)?;
        if self.status != MatchStatus::Active {
            return Err(GameError::GameNotActive);
        }
        if color != self.board.side_to_move {
            return Err(GameError::NotYourTurn);
        }
        // A flag that fell before the move arrived ends the match instead.
        if self.tick(now).is_some() {
            return Err(GameError::GameNotActive);
        }
        if !self.validator.is_legal(&self.board, from, to, color) {
            return Err(GameError::IllegalMove);
        }
        let record = self
            .board
            .apply_move(from, to, promotion)
            .ok_or(GameError::IllegalMove)?;

        let opponent = color.opposite();
        self.clock.switch_turn_at(color, opponent, now);
        self.pending_undo = None;

        if self.validator.is_checkmate(&self.board, opponent) {
            self.finish_on_move(MatchStatus::Checkmate, Some(color), EndReason::Checkmate);
        } else if self.validator.is_stalemate(&self.board, opponent) {
            self.finish_on_move(MatchStatus::Stalemate, None, EndReason::Stalemate);
        } else if let Some(reason) = self.validator.draw_reason(&self.board) {
            self.draw_reason = Some(reason);
            self.finish_on_move(MatchStatus::Draw, None, EndReason::Draw);
        }

        Ok(MoveOutcome {
            record,
            is_check: self.validator.is_check(&self.board, opponent),
        })
    }

    /// Legal destinations from `square`. Empty unless the match is active.
    pub fn legal_moves(&self, square: Square) -> Vec<Square> {
        if self.status != MatchStatus::Active {
            return Vec::new();
        }
        squares(self.validator.legal_moves(&self.board, square)).collect()
    }

    /// Advance the clock. Returns the side that just ran out of time.
    pub fn tick(&mut self, now: Instant) -> Option<Color> {
        if self.status != MatchStatus::Active {
            return None;
        }
        let flagged = self.clock.tick_at(now)?;
        self.handle_timeout(flagged).then_some(flagged)
    }

    /// End the match on time. Ignored unless the match is still active.
    pub fn handle_timeout(&mut self, flagged: Color) -> bool {
        if self.status != MatchStatus::Active {
            return false;
        }
        info!(match_id = %self.id, color = %flagged, "flag fell");
        self.finish(MatchStatus::Timeout, Some(flagged.opposite()), EndReason::Timeout);
        true
    }

    pub fn surrender(&mut self, user: &UserId) -> GameResult<Color> {
        let color = self.color_of(user).ok_or(GameError::NotInGame)?;
        if self.status != MatchStatus::Active {
            return Err(GameError::GameNotActive);
        }
        let winner = color.opposite();
        self.finish(MatchStatus::Resigned, Some(winner), EndReason::Surrender);
        Ok(winner)
    }

    // --- Offers ---

    /// Arm an undo request. Returns the color that must answer it.
    pub fn request_undo(&mut self, user: &UserId) -> GameResult<Color> {
        let color = self.offer_precheck(user, OfferKind::Undo)?;
        if self.board.ply_count() == 0 {
            return Err(GameError::NothingToUndo);
        }
        if !self.undo_allowed() {
            return Err(GameError::GameNotActive);
        }
        self.pending_undo = Some(PendingOffer { requester: color });
        Ok(color.opposite())
    }

    /// Answer the pending undo request. Accepting takes back exactly one ply
    /// and reopens a match that ended on that ply.
    pub fn respond_undo(&mut self, user: &UserId, accepted: bool, now: Instant) -> GameResult<bool> {
        self.check_responder(user, OfferKind::Undo)?;
        if accepted && !self.undo_allowed() {
            return Err(GameError::GameNotActive);
        }
        self.take_offer_for_responder(user, OfferKind::Undo)?;
        if !accepted {
            return Ok(false);
        }
        self.board.undo_move().ok_or(GameError::NothingToUndo)?;

        if self.status.is_terminal() {
            info!(match_id = %self.id, "match reopened by undo");
            self.status = MatchStatus::Active;
            self.winner = None;
            self.end_reason = None;
            self.draw_reason = None;
            self.end_processed = false;
            self.ended_on_ply = None;
            self.epoch += 1;
        }
        self.clock.rewind_to(self.board.side_to_move, now);
        Ok(true)
    }

    pub fn offer_draw(&mut self, user: &UserId) -> GameResult<Color> {
        let color = self.offer_precheck(user, OfferKind::Draw)?;
        if self.status != MatchStatus::Active {
            return Err(GameError::GameNotActive);
        }
        self.pending_draw = Some(PendingOffer { requester: color });
        Ok(color.opposite())
    }

    pub fn respond_draw(&mut self, user: &UserId, accepted: bool) -> GameResult<bool> {
        self.check_responder(user, OfferKind::Draw)?;
        if accepted && self.status != MatchStatus::Active {
            return Err(GameError::GameNotActive);
        }
        self.take_offer_for_responder(user, OfferKind::Draw)?;
        if !accepted {
            return Ok(false);
        }
        self.finish(MatchStatus::Draw, None, EndReason::Draw);
        Ok(true)
    }

    /// Ask for a rematch of a finished match.
    pub fn request_rematch(&mut self, user: &UserId) -> GameResult<Color> {
        let color = self.offer_precheck(user, OfferKind::Rematch)?;
        if !self.status.is_terminal() {
            return Err(GameError::GameInProgress);
        }
        self.pending_rematch = Some(PendingOffer { requester: color });
        Ok(color.opposite())
    }

    /// Answer a rematch request. Accepting swaps colors and starts a fresh game.
    pub fn respond_rematch(&mut self, user: &UserId, accepted: bool, now: Instant) -> GameResult<bool> {
        self.check_responder(user, OfferKind::Rematch)?;
        if accepted && (!self.status.is_terminal() || !self.is_full()) {
            return Err(GameError::GameInProgress);
        }
        self.take_offer_for_responder(user, OfferKind::Rematch)?;
        if !accepted {
            return Ok(false);
        }
        self.restart(now);
        Ok(true)
    }

    // --- End-of-match bookkeeping ---

    /// Claim the right to announce the current ending. Returns `true` once
    /// per ending; an undo that reopens the match allows the next ending to
    /// be announced too.
    pub fn claim_end(&mut self) -> bool {
        if self.status.is_terminal() && !self.end_processed {
            self.end_processed = true;
            true
        } else {
            false
        }
    }

    /// Claim the right to record ratings for this match. Returns `true` at
    /// most once until a rematch starts a new game.
    pub fn claim_results(&mut self) -> bool {
        if self.status.is_terminal() && !self.results_recorded {
            self.results_recorded = true;
            true
        } else {
            false
        }
    }

    /// Stop the clock for good, e.g. when the match is being discarded.
    pub fn retire(&mut self) {
        self.clock.stop();
        self.epoch += 1;
    }

    // --- Internals ---

    fn finish(&mut self, status: MatchStatus, winner: Option<Color>, reason: EndReason) {
        self.status = status;
        self.winner = winner;
        self.end_reason = Some(reason);
        self.pending_draw = None;
        self.pending_undo = None;
        self.clock.stop();
        info!(
            match_id = %self.id,
            %status,
            winner = ?winner,
            reason = ?reason,
            "match ended"
        );
        debug!(match_id = %self.id, "final position\n{}", render_board(&self.board));
    }

    fn finish_on_move(&mut self, status: MatchStatus, winner: Option<Color>, reason: EndReason) {
        self.finish(status, winner, reason);
        self.ended_on_ply = Some(self.board.ply_count());
    }

    /// Undo is open while playing, or right after the ply that ended the match.
    fn undo_allowed(&self) -> bool {
        match self.status {
            MatchStatus::Active => true,
            status if status.is_terminal() => self.ended_on_ply == Some(self.board.ply_count()),
            _ => false,
        }
    }

    fn offer_precheck(&self, user: &UserId, kind: OfferKind) -> GameResult<Color> {
        let color = self.color_of(user).ok_or(GameError::NotInGame)?;
        if !self.is_full() {
            return Err(GameError::OpponentMissing);
        }
        if self.pending_offer(kind).is_some() {
            return Err(GameError::OfferAlreadyPending(kind));
        }
        Ok(color)
    }

    /// The pending offer of `kind` exists and `user` is the side that may answer it.
    fn check_responder(&self, user: &UserId, kind: OfferKind) -> GameResult<()> {
        let color = self.color_of(user).ok_or(GameError::NotInGame)?;
        let offer = self.pending_offer(kind).ok_or(GameError::NoPendingOffer(kind))?;
        if offer.requester == color {
            return Err(GameError::OwnOffer);
        }
        Ok(())
    }

    fn take_offer_for_responder(&mut self, user: &UserId, kind: OfferKind) -> GameResult<PendingOffer> {
        let color = self.color_of(user).ok_or(GameError::NotInGame)?;
        let slot = match kind {
            OfferKind::Undo => &mut self.pending_undo,
            OfferKind::Draw => &mut self.pending_draw,
            OfferKind::Rematch => &mut self.pending_rematch,
        };
        let offer = slot.ok_or(GameError::NoPendingOffer(kind))?;
        if offer.requester == color {
            return Err(GameError::OwnOffer);
        }
        *slot = None;
        Ok(offer)
    }

    fn restart(&mut self, now: Instant) {
        self.seats.swap(0, 1);
        self.board = Board::new_game();
        self.clock.reset();
        self.status = MatchStatus::Active;
        self.winner = None;
        self.end_reason = None;
        self.draw_reason = None;
        self.pending_undo = None;
        self.pending_draw = None;
        self.pending_rematch = None;
        self.end_processed = false;
        self.results_recorded = false;
        self.ended_on_ply = None;
        self.epoch += 1;
        self.clock.start_at(Color::White, now);
        info!(match_id = %self.id, "rematch started");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::long_algebraic::parse_long_algebraic;
    use std::time::Duration;

    fn player(name: &str) -> Identity {
        Identity {
            id: UserId::new(name),
            username: name.to_owned(),
            rating: 600,
        }
    }

    fn started(tc: TimeControl, t0: Instant) -> (Match, UserId, UserId) {
        let mut game = Match::new(tc, None);
        let white = player("white_player");
        let black = player("black_player");
        assert_eq!(game.add_player(white.clone(), t0), Ok(Color::White));
        assert_eq!(game.add_player(black.clone(), t0), Ok(Color::Black));
        (game, white.id, black.id)
    }

    fn play(game: &mut Match, white: &UserId, black: &UserId, moves: &[&str], now: Instant) {
        for text in moves {
            let (from, to, promo) = parse_long_algebraic(text).expect("test move should parse");
            let mover = match game.current_turn() {
                Color::White => white,
                Color::Black => black,
            };
            game.make_move(mover, from, to, promo, now)
                .expect("test move should be accepted");
        }
    }

    #[test]
    fn second_seat_starts_the_match_and_clock() {
        let t0 = Instant::now();
        let mut game = Match::new(TimeControl::Rapid, None);
        game.add_player(player("a_player"), t0).expect("first seat");
        assert_eq!(game.status(), MatchStatus::Waiting);
        assert_eq!(game.clock().active_color(), None);

        game.add_player(player("b_player"), t0).expect("second seat");
        assert_eq!(game.status(), MatchStatus::Active);
        assert_eq!(game.clock().active_color(), Some(Color::White));
        assert_eq!(game.add_player(player("c_player"), t0), Err(GameError::GameFull));
    }

    #[test]
    fn moves_are_rejected_without_side_effects() {
        let t0 = Instant::now();
        let (mut game, white, black) = started(TimeControl::Blitz, t0);
        let stranger = UserId::new("stranger");

        assert_eq!(
            game.make_move(&black, 52, 36, None, t0).err(),
            Some(GameError::NotYourTurn)
        );
        assert_eq!(
            game.make_move(&white, 12, 36, None, t0).err(),
            Some(GameError::IllegalMove)
        );
        assert_eq!(
            game.make_move(&stranger, 12, 28, None, t0).err(),
            Some(GameError::NotInGame)
        );
        assert_eq!(game.board().ply_count(), 0);
        assert_eq!(game.clock().remaining(Color::White), 180_000);
    }

    #[test]
    fn fools_mate_ends_in_checkmate_for_black() {
        let t0 = Instant::now();
        let (mut game, white, black) = started(TimeControl::Blitz, t0);
        play(&mut game, &white, &black, &["f2f3", "e7e5", "g2g4", "d8h4"], t0);

        assert_eq!(game.status(), MatchStatus::Checkmate);
        assert_eq!(game.winner(), Some(Color::Black));
        assert_eq!(game.end_reason(), Some(EndReason::Checkmate));
        assert_eq!(game.clock().active_color(), None);
        assert!(game.claim_end());
        assert!(!game.claim_end());
        assert_eq!(
            game.make_move(&white, 12, 28, None, t0).err(),
            Some(GameError::GameNotActive)
        );
    }

    #[test]
    fn knight_shuffle_draws_by_repetition_on_the_eighth_ply() {
        let t0 = Instant::now();
        let (mut game, white, black) = started(TimeControl::Classical, t0);
        let shuffle = ["g1f3", "g8f6", "f3g1", "f6g8"];
        play(&mut game, &white, &black, &shuffle, t0);
        play(&mut game, &white, &black, &shuffle[..3], t0);
        assert_eq!(game.status(), MatchStatus::Active);
        play(&mut game, &white, &black, &shuffle[3..], t0);
        assert_eq!(game.status(), MatchStatus::Draw);
        assert_eq!(game.draw_reason(), Some(DrawReason::ThreefoldRepetition));
        assert_eq!(game.winner(), None);
    }

    #[test]
    fn timeout_is_honoured_once() {
        let t0 = Instant::now();
        let (mut game, _white, _black) = started(TimeControl::Bullet, t0);
        let late = t0 + Duration::from_secs(61);

        assert_eq!(game.tick(late), Some(Color::White));
        assert_eq!(game.status(), MatchStatus::Timeout);
        assert_eq!(game.winner(), Some(Color::Black));
        assert_eq!(game.tick(late + Duration::from_secs(1)), None);
        assert!(!game.handle_timeout(Color::Black));
        assert_eq!(game.winner(), Some(Color::Black));
    }

    #[test]
    fn move_after_the_flag_fell_ends_the_match_instead() {
        let t0 = Instant::now();
        let (mut game, white, _black) = started(TimeControl::Bullet, t0);
        let late = t0 + Duration::from_secs(90);
        assert_eq!(
            game.make_move(&white, 12, 28, None, late).err(),
            Some(GameError::GameNotActive)
        );
        assert_eq!(game.status(), MatchStatus::Timeout);
    }

    #[test]
    fn undo_flow_requires_the_other_side_to_answer() {
        let t0 = Instant::now();
        let (mut game, white, black) = started(TimeControl::Blitz, t0);
        assert_eq!(game.request_undo(&white).err(), Some(GameError::NothingToUndo));

        play(&mut game, &white, &black, &["e2e4"], t0);
        assert_eq!(game.request_undo(&white), Ok(Color::Black));
        assert_eq!(
            game.request_undo(&white).err(),
            Some(GameError::OfferAlreadyPending(OfferKind::Undo))
        );
        assert_eq!(game.respond_undo(&white, true, t0).err(), Some(GameError::OwnOffer));

        assert_eq!(game.respond_undo(&black, true, t0), Ok(true));
        assert_eq!(game.board().ply_count(), 0);
        assert_eq!(game.current_turn(), Color::White);
        assert_eq!(game.clock().active_color(), Some(Color::White));
        assert_eq!(
            game.respond_undo(&black, true, t0).err(),
            Some(GameError::NoPendingOffer(OfferKind::Undo))
        );
    }

    #[test]
    fn undo_reopens_a_match_that_ended_on_the_last_ply() {
        let t0 = Instant::now();
        let (mut game, white, black) = started(TimeControl::Blitz, t0);
        play(&mut game, &white, &black, &["f2f3", "e7e5", "g2g4", "d8h4"], t0);
        assert!(game.claim_end());
        assert!(game.claim_results());

        game.request_undo(&black).expect("undo after mate should be allowed");
        assert_eq!(game.respond_undo(&white, true, t0), Ok(true));
        assert_eq!(game.status(), MatchStatus::Active);
        assert_eq!(game.winner(), None);
        assert_eq!(game.current_turn(), Color::Black);
        assert_eq!(game.clock().active_color(), Some(Color::Black));
        assert!(!game.claim_results());

        // The next ending is announced but never rated a second time.
        game.surrender(&black).expect("surrender should be accepted");
        assert!(game.claim_end());
        assert!(!game.claim_results());
    }

    #[test]
    fn ending_the_match_clears_armed_offers() {
        let t0 = Instant::now();
        let (mut game, white, black) = started(TimeControl::Blitz, t0);
        game.offer_draw(&black).expect("draw offer should arm");
        play(&mut game, &white, &black, &["e2e4"], t0);
        game.surrender(&black).expect("surrender should be accepted");

        assert_eq!(game.pending_offer(OfferKind::Draw), None);
        assert_eq!(
            game.respond_draw(&white, true).err(),
            Some(GameError::NoPendingOffer(OfferKind::Draw))
        );
        assert_eq!(game.status(), MatchStatus::Resigned);

        let (mut game, white, black) = started(TimeControl::Blitz, t0);
        play(&mut game, &white, &black, &["e2e4"], t0);
        game.request_undo(&white).expect("undo request should arm");
        assert_eq!(game.respond_undo(&white, true, t0).err(), Some(GameError::OwnOffer));
        assert!(game.pending_offer(OfferKind::Undo).is_some());

        game.surrender(&white).expect("surrender should be accepted");
        assert_eq!(game.pending_offer(OfferKind::Undo), None);
        assert_eq!(
            game.respond_undo(&black, true, t0).err(),
            Some(GameError::NoPendingOffer(OfferKind::Undo))
        );
    }

    #[test]
    fn accepting_a_rematch_too_early_keeps_the_request() {
        let t0 = Instant::now();
        let (mut game, white, black) = started(TimeControl::Blitz, t0);
        game.surrender(&white).expect("surrender should be accepted");
        game.request_rematch(&white).expect("rematch request should arm");
        assert_eq!(game.respond_rematch(&white, true, t0).err(), Some(GameError::OwnOffer));
        assert!(game.pending_offer(OfferKind::Rematch).is_some());
        assert_eq!(game.respond_rematch(&black, true, t0), Ok(true));
        assert_eq!(game.status(), MatchStatus::Active);
        assert!(!game.claim_results());
    }

    #[test]
    fn undo_is_refused_after_resignation() {
        let t0 = Instant::now();
        let (mut game, white, black) = started(TimeControl::Blitz, t0);
        play(&mut game, &white, &black, &["e2e4"], t0);
        game.surrender(&black).expect("surrender should be accepted");
        assert_eq!(game.request_undo(&white).err(), Some(GameError::GameNotActive));
    }

    #[test]
    fn declining_an_offer_just_clears_it() {
        let t0 = Instant::now();
        let (mut game, white, black) = started(TimeControl::Blitz, t0);
        game.offer_draw(&black).expect("draw offer should arm");
        assert_eq!(game.respond_draw(&white, false), Ok(false));
        assert_eq!(game.pending_offer(OfferKind::Draw), None);
        assert_eq!(game.status(), MatchStatus::Active);

        game.offer_draw(&white).expect("draw offer should arm again");
        assert_eq!(game.respond_draw(&black, true), Ok(true));
        assert_eq!(game.status(), MatchStatus::Draw);
        assert_eq!(game.end_reason(), Some(EndReason::Draw));
    }

    #[test]
    fn leaving_forfeits_only_a_full_active_match() {
        let t0 = Instant::now();
        let mut waiting = Match::new(TimeControl::Blitz, None);
        let loner = player("loner");
        waiting.add_player(loner.clone(), t0).expect("seat");
        assert_eq!(waiting.forfeit(&loner.id, EndReason::OpponentLeft), None);
        assert_eq!(waiting.status(), MatchStatus::Waiting);

        let (mut game, white, _black) = started(TimeControl::Blitz, t0);
        assert_eq!(game.forfeit(&white, EndReason::OpponentDisconnected), Some(Color::Black));
        assert_eq!(game.status(), MatchStatus::Resigned);
        assert_eq!(game.end_reason(), Some(EndReason::OpponentDisconnected));
        assert_eq!(game.remove_player(&white), Some(Color::White));
        assert!(!game.is_full());
    }

    #[test]
    fn rematch_swaps_colors_and_resets_everything() {
        let t0 = Instant::now();
        let (mut game, white, black) = started(TimeControl::Blitz, t0);
        assert_eq!(game.request_rematch(&white).err(), Some(GameError::GameInProgress));

        play(&mut game, &white, &black, &["e2e4", "e7e5"], t0);
        game.surrender(&white).expect("surrender should be accepted");
        let epoch = game.epoch();

        game.request_rematch(&black).expect("rematch request should arm");
        assert_eq!(game.respond_rematch(&black, true, t0).err(), Some(GameError::OwnOffer));
        assert_eq!(game.respond_rematch(&white, true, t0), Ok(true));

        assert_eq!(game.color_of(&white), Some(Color::Black));
        assert_eq!(game.color_of(&black), Some(Color::White));
        assert_eq!(game.status(), MatchStatus::Active);
        assert_eq!(game.board().ply_count(), 0);
        assert_eq!(game.clock().remaining(Color::White), 180_000);
        assert_eq!(game.clock().remaining(Color::Black), 180_000);
        assert!(game.epoch() > epoch);
        assert!(!game.claim_end());
    }

    #[test]
    fn legal_moves_are_empty_once_the_match_is_over() {
        let t0 = Instant::now();
        let (mut game, _white, black) = started(TimeControl::Blitz, t0);
        assert_eq!(game.legal_moves(12), vec![20, 28]);
        game.surrender(&black).expect("surrender should be accepted");
        assert!(game.legal_moves(12).is_empty());
    }
}
