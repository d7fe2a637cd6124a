use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    CreateOrderHandler, CreateOrderInput, InMemoryEventPublisher, Order, OrderCreated,
};
use event_store::{CorrelationId, EventId, IdempotencyKey, InMemoryEventLedger};

fn bench_validate_order(c: &mut Criterion) {
    let input = CreateOrderInput::new("cust-1", 500).with_order_id("order-1");

    c.bench_function("domain/validate_order", |b| {
        b.iter(|| Order::from_input(&input).unwrap());
    });
}

fn bench_build_event(c: &mut Criterion) {
    let order = Order::from_input(&CreateOrderInput::new("cust-1", 500)).unwrap();

    c.bench_function("domain/build_event", |b| {
        b.iter(|| {
            let event = OrderCreated::new(
                EventId::generate(),
                CorrelationId::generate(),
                IdempotencyKey::for_order(order.id()),
                &order,
            );
            event.to_record()
        });
    });
}

fn bench_create_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("domain/create_order", |b| {
        b.iter(|| {
            rt.block_on(async {
                let handler = CreateOrderHandler::new(
                    InMemoryEventLedger::new(),
                    InMemoryEventPublisher::new(),
                );
                handler
                    .execute(CreateOrderInput::new("cust-1", 500), CorrelationId::generate())
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_duplicate_command(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let handler = CreateOrderHandler::new(InMemoryEventLedger::new(), InMemoryEventPublisher::new());
    let input = CreateOrderInput::new("cust-1", 500).with_order_id("order-1");
    rt.block_on(async {
        handler
            .execute(input.clone(), CorrelationId::generate())
            .await
            .unwrap();
    });

    c.bench_function("domain/duplicate_command", |b| {
        b.iter(|| {
            rt.block_on(async {
                let result = handler
                    .execute(input.clone(), CorrelationId::generate())
                    .await;
                assert!(result.is_err());
            });
        });
    });
}

criterion_group!(
    benches,
    bench_validate_order,
    bench_build_event,
    bench_create_order,
    bench_duplicate_command
);
criterion_main!(benches);
