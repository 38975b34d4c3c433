use chrono::{Duration, Utc};
use common::Money;
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use domain::{
    AddOrderItems, CreateOrder, OrderItemInput, OrderService, ProductService, SalesSlotService,
};
use store::InMemoryStore;

/// Builds an active slot with one product stocked at `initial`.
async fn stocked(initial: u32) -> (InMemoryStore, CreateOrder) {
    let store = InMemoryStore::new();
    let slots = SalesSlotService::new(store.clone());
    let products = ProductService::new(store.clone());

    let start = Utc::now();
    let slot = slots.create(start, start + Duration::hours(2)).await.unwrap();
    slots.activate(slot.id).await.unwrap();
    let product = products
        .create("Yakisoba".into(), Money::from_minor(500))
        .await
        .unwrap();
    slots.add_product(slot.id, product.id, initial).await.unwrap();

    let cmd = CreateOrder::new(slot.id, vec![OrderItemInput::new(product.id, 1)], "");
    (store, cmd)
}

fn bench_create_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, template) = rt.block_on(stocked(u32::MAX));
    let service = OrderService::new(store);
    let mut ticket = 0u64;

    c.bench_function("order/create", |b| {
        b.iter(|| {
            ticket += 1;
            let mut cmd = template.clone();
            cmd.ticket_number = format!("B{ticket}");
            rt.block_on(async { service.create_order(cmd).await.unwrap() });
        });
    });
}

fn bench_create_confirm(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, template) = rt.block_on(stocked(u32::MAX));
    let service = OrderService::new(store);
    let mut ticket = 0u64;

    c.bench_function("order/create_confirm", |b| {
        b.iter(|| {
            ticket += 1;
            let mut cmd = template.clone();
            cmd.ticket_number = format!("C{ticket}");
            rt.block_on(async {
                let order = service.create_order(cmd).await.unwrap();
                service.confirm(order.id).await.unwrap();
            });
        });
    });
}

fn bench_add_items(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("order/add_items", |b| {
        b.iter_batched(
            || {
                rt.block_on(async {
                    let (store, cmd) = stocked(1_000).await;
                    let service = OrderService::new(store);
                    let items = cmd.items.clone();
                    let order = service.create_order(cmd).await.unwrap();
                    (service, AddOrderItems::new(order.id, items))
                })
            },
            |(service, add)| {
                rt.block_on(async { service.add_items(add).await.unwrap() });
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_create_order,
    bench_create_confirm,
    bench_add_items
);
criterion_main!(benches);
