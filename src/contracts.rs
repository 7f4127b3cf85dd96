use alloy::sol;

sol! {
    function getAmountsOut(uint256 amountIn, address[] path) external view returns (uint256[] amounts);
}
