use uuid::Uuid;

/// Countable equipment stock for a studio. `availableQty` is derived,
/// never stored: `total_qty - maintenance_qty - in_use_qty`.
#[derive(Clone, Debug)]
pub struct Equipment {
    pub id: Uuid,
    pub studio_id: Uuid,
    pub name: String,
    pub price_per_hour: i64,
    pub total_qty: i32,
    pub maintenance_qty: i32,
    pub in_use_qty: i32,
}

impl Equipment {
    pub fn available_qty(&self) -> i32 {
        self.total_qty - self.maintenance_qty - self.in_use_qty
    }
}
