// Documents stored in the app's collections, plus the form inputs that
// create and edit them.
pub mod material;
pub mod order;
pub mod product;

pub use material::{CreateMaterialInput, RawMaterial, UpdateMaterialInput};
pub use order::{
    CreateOrderInput, OrderPriority, OrderStatus, ProductionOrder, UpdateOrderInput,
};
pub use product::{CreateProductInput, Product, RequiredMaterial, RequiredMaterialInput};
