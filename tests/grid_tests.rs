// Integration tests for the grid engine against the simulated exchange

use std::sync::Arc;

use chrono::Utc;
use spot_grid::{
    EngineError, Fill, Grid, GridEngine, LevelState, OrderGateway, OrderSide, PricePath,
    SimulatedExchange,
};

fn engine_with_sim(
    reference: f64,
    investment: f64,
    grid_count: usize,
    range_percent: f64,
) -> (GridEngine, Arc<SimulatedExchange>) {
    let exchange = Arc::new(SimulatedExchange::new(
        reference,
        PricePath::replay(vec![]),
    ));
    let grid = Grid::build("BTC/EUR", reference, investment, grid_count, range_percent).unwrap();
    let engine = GridEngine::new(grid, exchange.clone(), 3, true);
    (engine, exchange)
}

#[tokio::test]
async fn test_activate_opens_every_level() {
    let (mut engine, exchange) = engine_with_sim(100.0, 1000.0, 4, 10.0);

    let outcome = engine.activate().await.unwrap();
    assert_eq!(outcome.placed, 4);
    assert_eq!(outcome.failed, 0);
    assert_eq!(exchange.pending_order_count().await, 4);

    for level in &engine.grid().levels {
        assert_eq!(level.state, LevelState::Open);
        assert!(level.order_id.is_some());
    }

    // A second pass is a no-op over already-open levels
    let outcome = engine.activate().await.unwrap();
    assert_eq!(outcome.placed, 0);
    assert_eq!(exchange.pending_order_count().await, 4);
}

#[tokio::test]
async fn test_buy_fill_rearms_sell_slot_one_step_above() {
    // Levels: 95, 98.33 (buy), 101.67, 105 (sell)
    let (mut engine, exchange) = engine_with_sim(100.0, 1000.0, 4, 10.0);
    engine.activate().await.unwrap();

    // Price rises: the 101.67 sell fills, freeing that slot
    exchange.tick(102.0).await;
    for fill in exchange.poll_fills().await.unwrap() {
        engine.on_fill(&fill).await.unwrap();
    }
    assert_eq!(engine.grid().levels[2].state, LevelState::Filled);

    // Price drops: the 98.33 buy fills; its replacement sell re-arms the
    // freed slot exactly one grid step above the fill
    exchange.tick(98.0).await;
    let fills = exchange.poll_fills().await.unwrap();
    assert_eq!(fills.len(), 1);
    let buy_qty = fills[0].quantity;
    for fill in &fills {
        engine.on_fill(fill).await.unwrap();
    }

    let grid = engine.grid();
    assert_eq!(grid.levels[1].state, LevelState::Filled);
    let replacement = &grid.levels[2];
    assert_eq!(replacement.state, LevelState::Open);
    assert_eq!(replacement.side, OrderSide::Sell);
    assert!((replacement.price - (grid.levels[1].price + grid.step())).abs() < 1e-9);
    assert_eq!(replacement.quantity, buy_qty);
    assert!(replacement.order_id.is_some());
}

#[tokio::test]
async fn test_sell_fill_rearms_buy_slot_one_step_below() {
    let (mut engine, exchange) = engine_with_sim(100.0, 1000.0, 4, 10.0);
    engine.activate().await.unwrap();

    // Free the 98.33 buy slot first (its replacement sell finds every
    // upper slot still open and is skipped)
    exchange.tick(98.0).await;
    for fill in exchange.poll_fills().await.unwrap() {
        engine.on_fill(&fill).await.unwrap();
    }

    // Now the original 101.67 sell fills; 105 does not cross at 102
    exchange.tick(102.0).await;
    let fills = exchange.poll_fills().await.unwrap();
    assert_eq!(fills.len(), 1);
    for fill in &fills {
        engine.on_fill(fill).await.unwrap();
    }

    // The sell fill re-arms the buy slot one step below (98.33)
    let grid = engine.grid();
    let rearmed = &grid.levels[1];
    assert_eq!(rearmed.state, LevelState::Open);
    assert_eq!(rearmed.side, OrderSide::Buy);
    assert!((rearmed.price - (grid.levels[2].price - grid.step())).abs() < 1e-9);
}

#[tokio::test]
async fn test_first_fill_with_no_free_slot_is_skipped() {
    let (mut engine, exchange) = engine_with_sim(100.0, 1000.0, 4, 10.0);
    engine.activate().await.unwrap();

    // Every slot above the filled buy still holds an open sell, so the
    // replacement has nowhere to go and the fill stays unhedged
    exchange.tick(98.0).await;
    for fill in exchange.poll_fills().await.unwrap() {
        engine.on_fill(&fill).await.unwrap();
    }

    assert_eq!(engine.grid().levels[1].state, LevelState::Filled);
    assert_eq!(exchange.pending_order_count().await, 3);
    assert!(engine.inventory() > 0.0);
}

#[tokio::test]
async fn test_on_fill_is_idempotent() {
    let (mut engine, exchange) = engine_with_sim(100.0, 1000.0, 4, 10.0);
    engine.activate().await.unwrap();

    exchange.tick(98.0).await;
    let fills = exchange.poll_fills().await.unwrap();
    assert_eq!(fills.len(), 1);

    engine.on_fill(&fills[0]).await.unwrap();
    let inventory = engine.inventory();
    let states: Vec<LevelState> = engine.grid().levels.iter().map(|l| l.state).collect();

    // Duplicate fill notification is a no-op
    engine.on_fill(&fills[0]).await.unwrap();
    assert_eq!(engine.inventory(), inventory);
    let states_after: Vec<LevelState> = engine.grid().levels.iter().map(|l| l.state).collect();
    assert_eq!(states_after, states);
}

#[tokio::test]
async fn test_unknown_fill_is_ignored() {
    let (mut engine, _exchange) = engine_with_sim(100.0, 1000.0, 4, 10.0);
    engine.activate().await.unwrap();

    let bogus = Fill {
        order_id: "sim-does-not-exist".to_string(),
        price: 98.0,
        quantity: 1.0,
        timestamp: Utc::now(),
    };
    engine.on_fill(&bogus).await.unwrap();
    assert_eq!(engine.inventory(), 0.0);
}

#[tokio::test]
async fn test_round_trip_realizes_grid_spread() {
    let (mut engine, exchange) = engine_with_sim(100.0, 1000.0, 4, 10.0);
    engine.activate().await.unwrap();

    // Free the sell slot, buy low, sell high one step up
    exchange.tick(102.0).await;
    for fill in exchange.poll_fills().await.unwrap() {
        engine.on_fill(&fill).await.unwrap();
    }
    exchange.tick(98.0).await;
    for fill in exchange.poll_fills().await.unwrap() {
        engine.on_fill(&fill).await.unwrap();
    }
    exchange.tick(102.0).await;
    for fill in exchange.poll_fills().await.unwrap() {
        engine.on_fill(&fill).await.unwrap();
    }

    // One full cycle: bought at 98.33, sold at 101.67
    let step = engine.grid().step();
    let buy_price = engine.grid().levels[1].price;
    let expected = (1000.0 / 4.0 / buy_price) * step;
    assert!((engine.realized_pnl() - expected).abs() < 1e-6);
    assert!(engine.inventory().abs() < 1e-9);
}

#[tokio::test]
async fn test_liquidate_cancels_all_open_levels() {
    let (mut engine, exchange) = engine_with_sim(100.0, 1000.0, 6, 10.0);
    engine.activate().await.unwrap();
    assert_eq!(exchange.pending_order_count().await, 6);

    engine.liquidate(100.0).await.unwrap();

    assert!(engine.is_closed());
    assert_eq!(exchange.pending_order_count().await, 0);
    for level in &engine.grid().levels {
        assert_eq!(level.state, LevelState::Cancelled);
    }

    // Idempotent
    engine.liquidate(100.0).await.unwrap();
}

#[tokio::test]
async fn test_liquidate_sells_accumulated_inventory() {
    let (mut engine, exchange) = engine_with_sim(100.0, 1000.0, 4, 10.0);
    engine.activate().await.unwrap();

    exchange.tick(98.0).await;
    for fill in exchange.poll_fills().await.unwrap() {
        engine.on_fill(&fill).await.unwrap();
    }
    let inventory = engine.inventory();
    assert!(inventory > 0.0);

    engine.liquidate(98.0).await.unwrap();

    // The liquidation sell is the only order left pending: it sits just
    // below the last price and has not crossed yet
    assert_eq!(exchange.pending_order_count().await, 1);
    exchange.tick(97.0).await;
    let fills = exchange.poll_fills().await.unwrap();
    assert_eq!(fills.len(), 1);
    assert_eq!(fills[0].quantity, inventory);
    assert!((fills[0].price - 98.0 * 0.995).abs() < 1e-9);
}

#[tokio::test]
async fn test_late_fill_after_liquidation_triggers_no_rebalance() {
    let (mut engine, exchange) = engine_with_sim(100.0, 1000.0, 4, 10.0);
    engine.activate().await.unwrap();

    // The buy fills at the gateway, but liquidation runs before the fill
    // notification is drained
    exchange.tick(98.0).await;
    engine.liquidate(98.0).await.unwrap();
    // Inventory was still zero at liquidation time, so no inventory sell
    let orders_after_liquidation = exchange.pending_order_count().await;
    assert_eq!(orders_after_liquidation, 0);

    let fills = exchange.poll_fills().await.unwrap();
    assert_eq!(fills.len(), 1);
    engine.on_fill(&fills[0]).await.unwrap();

    // The late fill is recorded but places no replacement order
    assert!(engine.inventory() > 0.0);
    assert_eq!(exchange.pending_order_count().await, 0);
}

#[tokio::test]
async fn test_halt_records_fills_without_rebalancing() {
    let (mut engine, exchange) = engine_with_sim(100.0, 1000.0, 4, 10.0);
    engine.activate().await.unwrap();

    exchange.tick(98.0).await;
    engine.halt();

    // The fill is recorded against its level but places no replacement
    let fills = exchange.poll_fills().await.unwrap();
    assert_eq!(fills.len(), 1);
    engine.on_fill(&fills[0]).await.unwrap();
    assert!(engine.inventory() > 0.0);
    assert_eq!(engine.grid().levels[1].state, LevelState::Filled);
    assert_eq!(exchange.pending_order_count().await, 3);

    // Liquidation after halt still cancels the ladder and sells the
    // inventory recorded in between
    engine.liquidate(98.0).await.unwrap();
    assert_eq!(exchange.pending_order_count().await, 1);
}

#[tokio::test]
async fn test_activate_on_closed_grid_fails() {
    let (mut engine, _exchange) = engine_with_sim(100.0, 1000.0, 4, 10.0);
    engine.liquidate(100.0).await.unwrap();
    assert!(matches!(
        engine.activate().await,
        Err(EngineError::GridClosed)
    ));
}

#[tokio::test]
async fn test_snapshot_reports_pnl_estimate() {
    let (mut engine, exchange) = engine_with_sim(100.0, 1000.0, 4, 10.0);
    engine.activate().await.unwrap();

    exchange.tick(98.0).await;
    for fill in exchange.poll_fills().await.unwrap() {
        engine.on_fill(&fill).await.unwrap();
    }

    let buy_price = engine.grid().levels[1].price;
    let snapshot = engine.snapshot(100.0);
    assert_eq!(snapshot.levels.len(), 4);
    assert!(!snapshot.closed);
    assert!(snapshot.inventory > 0.0);
    let expected = snapshot.inventory * (100.0 - buy_price);
    assert!((snapshot.pnl_estimate - expected).abs() < 1e-9);
}
