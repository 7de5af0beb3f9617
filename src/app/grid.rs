use crate::app::RunbookContext;
use crate::core::grid::GridController;
use crate::utils::error::Result;

pub async fn pool_node(
    ctx: &RunbookContext<'_>,
    grid_project: &str,
    host_fqdn: &str,
) -> Result<()> {
    let grid = ctx.settings.grid_project(grid_project)?;
    let controller = GridController::new(ctx.executor, grid);

    ctx.sal
        .log(&format!("Pooling the grid node {}", host_fqdn))
        .await?;
    controller.pool_node(host_fqdn).await?;
    let queues = controller.node_queues(host_fqdn).await?;
    tracing::info!("Queues of {} after pooling:\n{}", host_fqdn, queues);
    ctx.sal
        .log(&format!("Pooled the grid node {}", host_fqdn))
        .await?;
    Ok(())
}

pub async fn depool_node(
    ctx: &RunbookContext<'_>,
    grid_project: &str,
    host_fqdn: &str,
) -> Result<()> {
    let grid = ctx.settings.grid_project(grid_project)?;
    let controller = GridController::new(ctx.executor, grid);

    ctx.sal
        .log(&format!("Depooling the grid node {}", host_fqdn))
        .await?;
    controller.depool_node(host_fqdn).await?;
    let queues = controller.node_queues(host_fqdn).await?;
    tracing::info!("Queues of {} after depooling:\n{}", host_fqdn, queues);
    ctx.sal
        .log(&format!("Depooled the grid node {}", host_fqdn))
        .await?;
    Ok(())
}
